//! Extraction of recipes from free-form model output.
//!
//! The text model is asked for a bare JSON array but routinely wraps it in
//! prose, code fences or truncates it. Parsing happens in two stages:
//!
//! 1. the span from the first `[` to the last `]` is cut out of the text
//! 2. the span is decoded as a JSON array and every element is decoded into a
//!    [`Recipe`] on its own; elements that do not fit are skipped
//!
//! Nothing here returns an error. Output that cannot be used at all yields an
//! empty list, which callers treat the same as a legitimate empty answer.

use crate::model::Recipe;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Parses every usable recipe out of a model response.
///
/// # Examples
///
/// ```
/// use recipe_finder_core::parse_recipes;
///
/// let text = r#"Sure! [{"id":"1","title":"Cake","durationMinutes":10,"ingredients":["sugar"],"instructions":["mix"],"imageUrl":""}] Enjoy!"#;
/// let recipes = parse_recipes(text);
/// assert_eq!(recipes.len(), 1);
/// assert_eq!(recipes[0].id(), "1");
///
/// assert!(parse_recipes("no json here").is_empty());
/// ```
pub fn parse_recipes(text: &str) -> Vec<Recipe> {
    let Some(span) = extract_array(text) else {
        debug!(len = text.len(), "no JSON array found in model response");
        return Vec::new();
    };

    let elements: Vec<Value> = match serde_json::from_str(span) {
        Ok(elements) => elements,
        Err(e) => {
            warn!(error = %e, span = %span, "model response is not a valid JSON array");
            return Vec::new();
        }
    };

    let total = elements.len();
    let recipes: Vec<Recipe> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match Recipe::deserialize(element) {
            Ok(recipe) => Some(recipe),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed recipe element");
                None
            }
        })
        .collect();

    debug!(total, parsed = recipes.len(), "parsed model response");
    recipes
}

/// Returns the text between the first `[` and the last `]`, inclusive.
fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}
