//! The closed relation vocabulary
//!
//! Every adjacency record carries exactly one slot per [`RelationName`].
//! Labels coming back from a model are free-form, so they are canonicalized
//! by lowercasing and stripping whitespace before being matched against a
//! static table. Anything that does not match is not a relation.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One of the 50 fixed semantic relation labels.
///
/// Variant order is the canonical slot order; `Ord` follows it, so a
/// `BTreeMap<RelationName, _>` iterates slots canonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationName {
    Identity,
    Contains,
    IsContainedBy,
    Variant,
    IsInstanceOf,
    HasInstance,
    IsTypeOf,
    HasType,
    PartOf,
    Composes,
    Mirrors,
    Inverts,
    ParallelTo,
    AdjacentTo,
    Next,
    SequenceOf,
    PrecededBy,
    Follows,
    SpatiallyAbove,
    SpatiallyBelow,
    SymbolicallySupports,
    SymbolicallyDepends,
    Contrasts,
    Complements,
    AssociatedWith,
    CorrelatesWith,
    Causes,
    CausedBy,
    Evokes,
    Represents,
    Symbolizes,
    RefersTo,
    Defines,
    IsDefinedBy,
    TransformsTo,
    TransformedFrom,
    FunctionsAs,
    InterpretedAs,
    UsedWith,
    CoOccursWith,
    Synthesizes,
    DividesInto,
    Opposes,
    Generalizes,
    Specializes,
    AnalogousTo,
    PrerequisiteOf,
    ResultOf,
    ContextFor,
    ExceptionOf,
}

use RelationName::*;

impl RelationName {
    /// Number of relations in the vocabulary.
    pub const COUNT: usize = 50;

    /// All relations in canonical order.
    pub const ALL: [RelationName; Self::COUNT] = [
        Identity,
        Contains,
        IsContainedBy,
        Variant,
        IsInstanceOf,
        HasInstance,
        IsTypeOf,
        HasType,
        PartOf,
        Composes,
        Mirrors,
        Inverts,
        ParallelTo,
        AdjacentTo,
        Next,
        SequenceOf,
        PrecededBy,
        Follows,
        SpatiallyAbove,
        SpatiallyBelow,
        SymbolicallySupports,
        SymbolicallyDepends,
        Contrasts,
        Complements,
        AssociatedWith,
        CorrelatesWith,
        Causes,
        CausedBy,
        Evokes,
        Represents,
        Symbolizes,
        RefersTo,
        Defines,
        IsDefinedBy,
        TransformsTo,
        TransformedFrom,
        FunctionsAs,
        InterpretedAs,
        UsedWith,
        CoOccursWith,
        Synthesizes,
        DividesInto,
        Opposes,
        Generalizes,
        Specializes,
        AnalogousTo,
        PrerequisiteOf,
        ResultOf,
        ContextFor,
        ExceptionOf,
    ];

    /// The canonical label, as it appears in persisted records.
    pub fn label(self) -> &'static str {
        match self {
            Identity => "Identity",
            Contains => "Contains",
            IsContainedBy => "Is Contained By",
            Variant => "Variant",
            IsInstanceOf => "Is Instance Of",
            HasInstance => "Has Instance",
            IsTypeOf => "Is Type Of",
            HasType => "Has Type",
            PartOf => "Part Of",
            Composes => "Composes",
            Mirrors => "Mirrors",
            Inverts => "Inverts",
            ParallelTo => "Parallel To",
            AdjacentTo => "Adjacent To",
            Next => "Next",
            SequenceOf => "Sequence Of",
            PrecededBy => "Preceded By",
            Follows => "Follows",
            SpatiallyAbove => "Spatially Above",
            SpatiallyBelow => "Spatially Below",
            SymbolicallySupports => "Symbolically Supports",
            SymbolicallyDepends => "Symbolically Depends",
            Contrasts => "Contrasts",
            Complements => "Complements",
            AssociatedWith => "Associated With",
            CorrelatesWith => "Correlates With",
            Causes => "Causes",
            CausedBy => "Caused By",
            Evokes => "Evokes",
            Represents => "Represents",
            Symbolizes => "Symbolizes",
            RefersTo => "Refers To",
            Defines => "Defines",
            IsDefinedBy => "Is Defined By",
            TransformsTo => "Transforms To",
            TransformedFrom => "Transformed From",
            FunctionsAs => "Functions As",
            InterpretedAs => "Interpreted As",
            UsedWith => "Used With",
            CoOccursWith => "Co-occurs With",
            Synthesizes => "Synthesizes",
            DividesInto => "Divides Into",
            Opposes => "Opposes",
            Generalizes => "Generalizes",
            Specializes => "Specializes",
            AnalogousTo => "Analogous To",
            PrerequisiteOf => "Prerequisite Of",
            ResultOf => "Result Of",
            ContextFor => "Context For",
            ExceptionOf => "Exception Of",
        }
    }

    /// Position in canonical order (0-based).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display glyph: circled digits ① … ⑳, cycling every 20 relations.
    pub fn symbol(self) -> char {
        char::from_u32(0x2460 + (self.index() % 20) as u32).unwrap_or('•')
    }

    /// Map an arbitrary label onto the vocabulary.
    ///
    /// Case and whitespace are ignored, so `"co-occurs   WITH"` and
    /// `"Co-occursWith"` both resolve to [`RelationName::CoOccursWith`].
    pub fn canonicalize(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::from_normalized(&key)
    }

    fn from_normalized(key: &str) -> Option<Self> {
        let rel = match key {
            "identity" => Identity,
            "contains" => Contains,
            "iscontainedby" => IsContainedBy,
            "variant" => Variant,
            "isinstanceof" => IsInstanceOf,
            "hasinstance" => HasInstance,
            "istypeof" => IsTypeOf,
            "hastype" => HasType,
            "partof" => PartOf,
            "composes" => Composes,
            "mirrors" => Mirrors,
            "inverts" => Inverts,
            "parallelto" => ParallelTo,
            "adjacentto" => AdjacentTo,
            "next" => Next,
            "sequenceof" => SequenceOf,
            "precededby" => PrecededBy,
            "follows" => Follows,
            "spatiallyabove" => SpatiallyAbove,
            "spatiallybelow" => SpatiallyBelow,
            "symbolicallysupports" => SymbolicallySupports,
            "symbolicallydepends" => SymbolicallyDepends,
            "contrasts" => Contrasts,
            "complements" => Complements,
            "associatedwith" => AssociatedWith,
            "correlateswith" => CorrelatesWith,
            "causes" => Causes,
            "causedby" => CausedBy,
            "evokes" => Evokes,
            "represents" => Represents,
            "symbolizes" => Symbolizes,
            "refersto" => RefersTo,
            "defines" => Defines,
            "isdefinedby" => IsDefinedBy,
            "transformsto" => TransformsTo,
            "transformedfrom" => TransformedFrom,
            "functionsas" => FunctionsAs,
            "interpretedas" => InterpretedAs,
            "usedwith" => UsedWith,
            "co-occurswith" => CoOccursWith,
            "synthesizes" => Synthesizes,
            "dividesinto" => DividesInto,
            "opposes" => Opposes,
            "generalizes" => Generalizes,
            "specializes" => Specializes,
            "analogousto" => AnalogousTo,
            "prerequisiteof" => PrerequisiteOf,
            "resultof" => ResultOf,
            "contextfor" => ContextFor,
            "exceptionof" => ExceptionOf,
            _ => return None,
        };
        Some(rel)
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RelationName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for RelationName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelVisitor;

        impl Visitor<'_> for LabelVisitor {
            type Value = RelationName;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("one of the 50 relation labels")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RelationName, E> {
                RelationName::canonicalize(value)
                    .ok_or_else(|| E::custom(format!("unknown relation '{}'", value)))
            }
        }

        deserializer.deserialize_str(LabelVisitor)
    }
}
