//! Chat completion boundary.
//!
//! Everything that talks to the language model goes through
//! [`CompletionClient`], so persona analysis and reply drafting can be
//! tested against a canned implementation.

pub mod extract;
mod http;

pub use http::HttpCompletionClient;

use crate::error::CompletionError;
use async_trait::async_trait;

/// One prompt in, one text completion out. The implementation owns the
/// model choice; callers pick only the temperature.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, CompletionError>;
}
