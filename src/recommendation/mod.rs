pub(crate) mod groq;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ChatError;

/// Prefix of the text shown in place of a recommendation when the call fails.
pub const ERROR_MARKER: &str = "An error occurred:";

/// Placeholder in a prompt template that is replaced by the user's text.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Completion backend the chat forwards prompts to.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}

#[async_trait]
impl<R: Recommender + ?Sized> Recommender for Box<R> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

pub fn render_prompt(template: &str, input: &str) -> String {
    if template.contains(INPUT_PLACEHOLDER) {
        template.replace(INPUT_PLACEHOLDER, input)
    } else {
        format!("{template} {input}")
    }
}

/// Asks the backend for a recommendation. Failures are reported in the
/// returned text and never surface as an error.
pub async fn request(recommender: &dyn Recommender, template: &str, input: &str) -> String {
    let prompt = render_prompt(template, input);
    debug!(model = recommender.model(), "Requesting recommendation");

    match recommender.complete(&prompt).await {
        Ok(text) => text,
        Err(error) => {
            let error = ChatError::ExternalCallFailure(error);
            warn!("Recommendation request failed: {error}");
            error.to_string()
        }
    }
}
