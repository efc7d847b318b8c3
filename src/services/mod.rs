pub mod completion;
pub mod discovery;
pub mod web_tips;

pub use completion::{ChatCompletionRequest, CompletionClient, OpenAICompatibleClient};
pub use discovery::{Discovery, GooglePlacesClient, SearchRequest};
pub use web_tips::{extract_ticket_price, JinaSearchClient, PriceLookup};

use std::{future::Future, time::Duration};

use crate::error::{PlannerError, Result};

/// Bound an external call. Elapsed calls become `PlannerError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, label: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PlannerError::Timeout(format!(
            "{} timed out after {}ms",
            label,
            limit.as_millis()
        ))),
    }
}
