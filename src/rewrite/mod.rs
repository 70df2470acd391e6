mod openai;

pub use openai::OpenAiRewriter;

use anyhow::Result;
use tracing::{error, info};

/// Default instruction prompt: plain text correction with no commentary.
pub const DEFAULT_PROMPT: &str = "Correct the following text to reflect educated, \
polite American English, adjusting grammar, syntax, and idioms while preserving \
meaning. Translate into English if necessary. Maintain clarity, accuracy, and a \
neutral tone, avoiding unnecessary changes or complex vocabulary. Do not ask for \
clarification; provide only the corrected text without introductions or additions \
such as \"here is the improved version\". Text to correct:";

/// One rewrite invocation. Constructed fresh per activation, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRequest {
    pub model: String,
    pub prompt: String,
    pub text: String,
}

/// The remote rewriting service. Transport and service failures of every kind
/// surface as one generic error; callers apply a uniform fallback policy.
pub trait Rewriter {
    fn rewrite(
        &self,
        request: &RewriteRequest,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Rewrite with the identity fallback: any failure is logged and the
    /// original text comes back unchanged, so a failed rewrite never destroys
    /// the user's selection.
    fn rewrite_or_original(
        &self,
        request: &RewriteRequest,
    ) -> impl std::future::Future<Output = String> + Send
    where
        Self: Sync,
    {
        async {
            match self.rewrite(request).await {
                Ok(rewritten) => {
                    info!("Text rewritten successfully");
                    rewritten
                }
                Err(err) => {
                    error!("Rewrite service error, keeping original text: {err:#}");
                    request.text.clone()
                }
            }
        }
    }
}
