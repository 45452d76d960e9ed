use crate::errors::LlmError;
use std::future::Future;

/// A text-in, text-out language model endpoint.
pub trait LanguageModel {
    /// Model identifier shown to the user.
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}
