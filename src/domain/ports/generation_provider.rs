//! Generation provider port - the text generator the orchestrator drives.

use async_trait::async_trait;

use crate::domain::errors::ProviderError;
use crate::domain::models::SessionContext;

/// A text-generation backend.
///
/// The wire protocol is the adapter's business; the core only depends on this
/// call. Implementations should return [`ProviderError::Timeout`] when their
/// own transport gives up so the attempt is recorded as `timed_out`.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Generate text for a fully rendered prompt.
    async fn generate(&self, prompt: &str, context: &SessionContext)
        -> Result<String, ProviderError>;
}
