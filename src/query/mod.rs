//! Turning a free-text query into recipe suggestions.
//!
//! [`RecipeQueryService`] embeds the query in a fixed prompt, sends it to a
//! [`TextGenerator`] and feeds whatever text comes back to the parser.
//! Remote failures are returned to the caller; unusable text is not an error
//! and simply yields no recipes.

use crate::model::Recipe;
use crate::parser::parse_recipes;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

mod gemini;
mod prompt;
mod validate;

pub use gemini::{GeminiGenerator, DEFAULT_MODEL};
pub use prompt::{build_prompt, STOCK_IMAGE_URL, SUGGESTION_COUNT};
pub use validate::{sanitize_query, MinLength, NotBlank, QueryValidator, ValidationError, Validator};

/// Errors from the remote text model.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Text model returned an error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Text model quota exceeded: {0}")]
    RateLimited(String),

    #[error("Failed to decode text model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Text model unavailable: {0}")]
    Unavailable(String),
}

/// Something that completes a prompt with free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the generated text, or `None` when the model produced no text.
    async fn generate(&self, prompt: &str) -> Result<Option<String>, QueryError>;
}

/// Source of recipe suggestions for a query.
#[async_trait]
pub trait RecipeQuery: Send + Sync {
    async fn search_recipes(&self, query: &str) -> Result<Vec<Recipe>, QueryError>;
}

/// Recipe search on top of a text generator.
#[derive(Clone)]
pub struct RecipeQueryService {
    generator: Arc<dyn TextGenerator>,
}

impl RecipeQueryService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        RecipeQueryService { generator }
    }
}

#[async_trait]
impl RecipeQuery for RecipeQueryService {
    async fn search_recipes(&self, query: &str) -> Result<Vec<Recipe>, QueryError> {
        let prompt = build_prompt(&sanitize_query(query));
        let text = match self.generator.generate(&prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("model returned no text");
                "[]".to_owned()
            }
            Err(e) => {
                warn!(error = %e, "recipe search failed");
                return Err(e);
            }
        };
        Ok(parse_recipes(&text))
    }
}
