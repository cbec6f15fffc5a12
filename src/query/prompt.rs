/// Stock image the model is told to reuse, since it cannot produce real ones.
pub const STOCK_IMAGE_URL: &str = "https://images.unsplash.com/photo-1546069901-ba9599a7e63c?q=80&w=1480&auto=format&fit=crop";

/// Number of suggestions requested per search.
pub const SUGGESTION_COUNT: usize = 5;

/// Builds the instruction sent to the text model for a (sanitized) query.
pub fn build_prompt(query: &str) -> String {
    let query = query.replace('"', "'");
    format!(
        r#"Suggest {SUGGESTION_COUNT} recipes based on: "{query}".
Return ONLY valid JSON in this exact format:
[
    {{
        "id": "unique_id",
        "title": "Recipe title",
        "durationMinutes": 20,
        "ingredients": ["ingredient1", "ingredient2"],
        "instructions": ["instruction1", "instruction2"],
        "imageUrl": "{STOCK_IMAGE_URL}"
    }}
]
Rules:
- Always use the same value for "imageUrl" exactly as shown above.
- No other text before or after the JSON."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_query() {
        let prompt = build_prompt("quick vegan dinner");
        assert!(prompt.starts_with(r#"Suggest 5 recipes based on: "quick vegan dinner"."#));
        assert!(prompt.contains(r#""durationMinutes": 20"#));
        assert!(prompt.contains(STOCK_IMAGE_URL));
    }

    #[test]
    fn test_prompt_neutralizes_quotes() {
        let prompt = build_prompt(r#"say "hello""#);
        assert!(prompt.contains(r#"based on: "say 'hello'"."#));
    }

    #[test]
    fn test_prompt_template_is_valid_json_shape() {
        let prompt = build_prompt("soup");
        let recipes = crate::parser::parse_recipes(&prompt);
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].id(), "unique_id");
        assert_eq!(recipes[0].image_url(), Some(STOCK_IMAGE_URL));
    }
}
