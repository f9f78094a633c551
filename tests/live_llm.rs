//! Acquisition against a real OpenAI-compatible endpoint.
//!
//! Run with `--features live_llm` and `OPENAI_API_KEY` set.

#![cfg(feature = "live_llm")]

use hlsf::acquire::Acquirer;
use hlsf::record::validate;
use hlsf::{CancellationToken, GenerationClient, HlsfConfig, OpenAiClient, Provenance};
use std::sync::Arc;

#[tokio::test]
async fn live_acquisition_returns_a_valid_record() {
    let config = HlsfConfig::load(None).unwrap();
    let client: Arc<dyn GenerationClient> = Arc::new(
        OpenAiClient::builder()
            .api_key(config.llm.api_key.clone().unwrap_or_default())
            .base_url(config.llm.base_url.clone())
            .build()
            .unwrap(),
    );
    let record = Acquirer::new(client)
        .with_config(config.acquire_config())
        .acquire("lighthouse", &config.model, None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(validate(&record).is_ok());
    assert!(record.non_empty_count() >= 1);
    assert!(matches!(
        record.meta.source,
        Provenance::Llm | Provenance::Bootstrap
    ));
}
