//! Instruction texts sent to the generation collaborator

use crate::llm::ChatMessage;
use crate::record::AdjacencyRecord;
use crate::relation::RelationName;

/// Answer prompt for the `ask` flow.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are an LLM assistant that provides concise, accurate answers. When helpful, you may use technical detail. Avoid chain-of-thought exposition.";

/// Rewrite prompt used after the graph has been scored.
pub const REFLECT_SYSTEM_PROMPT: &str = "You refine earlier answers using structured signals. You are brief, correct, and well-organized.";

/// Disambiguation hint instruction.
pub const CONTEXT_HINT_SYSTEM: &str = "Return a single short sentence giving the domain/sense of the given word/phrase, followed by 6 comma-separated key facets. No markdown.";

/// The slots the base instruction nudges the model towards.
const PREFERRED_SLOTS: [RelationName; 7] = [
    RelationName::CoOccursWith,
    RelationName::AssociatedWith,
    RelationName::SequenceOf,
    RelationName::Defines,
    RelationName::Represents,
    RelationName::Symbolizes,
    RelationName::RefersTo,
];

fn quoted_labels(relations: impl IntoIterator<Item = RelationName>) -> String {
    relations
        .into_iter()
        .map(|r| format!("\"{}\"", r.label()))
        .collect::<Vec<_>>()
        .join(",")
}

fn schema_line() -> String {
    format!(
        "Schema:\n{{\"token\":\"<lowercase>\",\"model\":\"<ignored>\",\"version\":1,\"slots\":{{{}}},\"meta\":{{\"language\":\"en\",\"downloaded_at\":\"<ISO>\",\"source\":\"LLM\"}}}}\nEvery slot value is an array.",
        quoted_labels(RelationName::ALL)
    )
}

/// System instruction for the base and contextual passes.
pub fn adjacency_base_instruction(min_entries: usize, min_slots: usize) -> String {
    format!(
        "Return ONLY one JSON object, EXACT keys, all 50 slots present (empty arrays allowed).\n\
         Populate at least {min_entries} neighbors total across at least {min_slots} of these slots:\n\
         {preferred}.\n\
         Each item: {{\"token\":\"<word/phrase>\",\"w\":<float 0..1>}} (descending by w). No extras, no commentary.\n{schema}",
        preferred = quoted_labels(PREFERRED_SLOTS),
        schema = schema_line(),
    )
}

/// System instruction for the forced pass.
pub fn adjacency_forced_instruction(min_entries: usize, min_slots: usize) -> String {
    format!(
        "Return ONLY one JSON object, EXACT keys, all 50 slots present.\n\
         If uncertain you MUST still populate at least {min_entries} neighbors total across at least {min_slots} slots \
         using broadly relevant, safe, generic associations. No empty result is allowed.\n\
         Each item: {{\"token\":\"<word/phrase>\",\"w\":<float 0..1>}} (descending by w). No extras, no commentary.\n{schema}",
        schema = schema_line(),
    )
}

/// A compact style example shown to the model.
fn few_shot() -> String {
    let example = AdjacencyRecord::empty("photosynthesis", "ignored")
        .with_edge(RelationName::CoOccursWith, "chlorophyll", 0.96)
        .with_edge(RelationName::CoOccursWith, "light energy", 0.91)
        .with_edge(RelationName::CoOccursWith, "carbon dioxide", 0.88)
        .with_edge(RelationName::Defines, "conversion of light to chemical energy", 0.93)
        .with_edge(RelationName::Defines, "glucose production", 0.84)
        .with_edge(RelationName::Defines, "oxygen release", 0.82);
    let mut slots = serde_json::Map::new();
    for (rel, edges) in &example.slots {
        slots.insert(
            rel.label().to_string(),
            serde_json::to_value(edges).unwrap_or_default(),
        );
    }
    serde_json::json!({
        "token": example.token,
        "model": example.model,
        "version": example.version,
        "slots": slots,
    })
    .to_string()
}

/// User instruction for an adjacency pass.
pub fn adjacency_user_instruction(token: &str, hint: Option<&str>) -> String {
    let context = hint.map(str::trim).filter(|h| !h.is_empty()).unwrap_or("n/a");
    format!(
        "token=\"{}\". Context: {}. Example JSON (style only):\n{}",
        token.to_lowercase(),
        context,
        few_shot()
    )
}

/// User instruction for the disambiguation hint.
pub fn context_hint_user_instruction(token: &str) -> String {
    format!("Token: \"{}\"", token)
}

/// Conversation for the initial answer in the `ask` flow.
pub fn answer_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Conversation asking the model to rewrite an answer given the narrative.
pub fn reflect_messages(payload: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REFLECT_SYSTEM_PROMPT),
        ChatMessage::user(payload),
    ]
}
