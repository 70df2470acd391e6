use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{RewriteRequest, Rewriter};

/// Chat-completions client for OpenAI-compatible services. The endpoint URL is
/// configurable so self-hosted or alternative providers work unchanged.
pub struct OpenAiRewriter {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiRewriter {
    pub fn new(api_url: String, api_key: String) -> Self {
        // No request timeout: a slow rewrite is preferable to racing one, and
        // the activation guard already keeps cycles from overlapping.
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }

    fn build_body(request: &RewriteRequest) -> serde_json::Value {
        json!({
            "model": request.model,
            "messages": [{
                "role": "user",
                "content": format!("{}\n\n{}", request.prompt.trim(), request.text),
            }],
        })
    }

    fn extract_text(response: ChatResponse) -> Result<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("Rewrite response contained no choices")?;
        Ok(choice.message.content.trim().to_string())
    }
}

impl Rewriter for OpenAiRewriter {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String> {
        debug!(
            model = request.model.as_str(),
            chars = request.text.chars().count(),
            "Calling rewrite service"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .context("Rewrite request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Rewrite service returned {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode rewrite response")?;
        Self::extract_text(parsed)
    }
}
