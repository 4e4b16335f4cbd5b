//! Model gateway and retrieval backends for ragent.
//!
//! All gateways implement `ragent_core::ModelGateway`; the router selects one
//! from configuration.

pub mod gemini;
pub mod http_retriever;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiGateway;
pub use http_retriever::HttpRetriever;
pub use openai_compat::OpenAiCompatGateway;
pub use router::{build_from_config, build_retriever};

use ragent_core::GatewayError;
use tracing::warn;

/// Map a non-success HTTP status to a gateway error.
///
/// Returns the response untouched when the status is 200.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status().as_u16();

    if status == 429 {
        return Err(GatewayError::RateLimited {
            retry_after_secs: 5,
        });
    }

    if status == 401 || status == 403 {
        return Err(GatewayError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if status != 200 {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Model API returned error");
        return Err(GatewayError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}
