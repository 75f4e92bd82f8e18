use async_trait::async_trait;

/// A text-generation backend that turns a flat prompt into one completed reply.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a reply for `prompt`.
    ///
    /// The call resolves only once the whole reply has been received, so
    /// callers never observe partial output. Any failure aborts the exchange.
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Model identifier sent to the backend.
    fn model(&self) -> &str;

    fn name(&self) -> &str;
}
