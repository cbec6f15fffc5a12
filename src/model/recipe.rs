use serde::{Deserialize, Deserializer, Serialize};

/// A single recipe as suggested by the text model.
///
/// Records are plain values: nothing in this crate mutates a `Recipe` once it
/// has been decoded. Favorite state is carried separately by [`RecipeItem`].
///
/// Decoding is lenient on purpose, since the upstream model is not bound to
/// a strict schema:
/// - a missing `id` decodes to an empty id (displayable, not favoritable)
/// - `durationMinutes` may be a number or a numeric string; missing, null,
///   negative or non-numeric values decode to 0 (unspecified)
/// - `instructions` may be a list of steps or a single block of text
/// - a blank `imageUrl` decodes to `None`
///
/// # Examples
///
/// ```
/// use recipe_finder_core::Recipe;
///
/// let recipe: Recipe = serde_json::from_str(
///     r#"{"id":"1","title":"Cake","durationMinutes":10,"ingredients":["sugar"],"instructions":["mix"],"imageUrl":""}"#,
/// )?;
/// assert_eq!(recipe.id(), "1");
/// assert_eq!(recipe.duration(), Some(10));
/// assert!(recipe.image_url().is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Identifier assigned by the model response
    #[serde(default)]
    id: String,
    /// Display name
    title: String,
    /// Preparation time, 0 when unspecified
    #[serde(default, deserialize_with = "deserialize_minutes")]
    duration_minutes: u32,
    /// Ingredients in display order
    #[serde(default, deserialize_with = "deserialize_lines")]
    ingredients: Vec<String>,
    /// Steps in display order
    #[serde(default, deserialize_with = "deserialize_lines")]
    instructions: Vec<String>,
    /// Remote image reference
    #[serde(
        default,
        deserialize_with = "deserialize_image_url",
        skip_serializing_if = "Option::is_none"
    )]
    image_url: Option<String>,
}

impl Recipe {
    /// Creates a recipe with the given id and title and no other details.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Recipe {
            id: id.into(),
            title: title.into(),
            duration_minutes: 0,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the image reference. Blank values are stored as `None`.
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = normalize_image_url(url.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the raw duration in minutes, 0 meaning unspecified.
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Returns the duration in minutes, or `None` if it was not specified.
    pub fn duration(&self) -> Option<u32> {
        (self.duration_minutes > 0).then_some(self.duration_minutes)
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Returns the image reference. `None` means the renderer shows a placeholder.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Returns true if this recipe can be stored in the favorite set.
    ///
    /// Recipes without an id can be displayed but never favorited, since
    /// favorite membership is keyed by id.
    pub fn is_favoritable(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// A recipe as shown to the user, paired with its favorite flag.
///
/// Toggling a favorite never mutates an item in place; it produces a new
/// item through [`RecipeItem::with_favorite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeItem {
    recipe: Recipe,
    is_favorite: bool,
}

impl RecipeItem {
    pub fn new(recipe: Recipe, is_favorite: bool) -> Self {
        RecipeItem {
            recipe,
            is_favorite,
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn id(&self) -> &str {
        self.recipe.id()
    }

    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    /// Returns a copy of this item carrying the given favorite flag.
    #[must_use]
    pub fn with_favorite(&self, is_favorite: bool) -> Self {
        RecipeItem {
            recipe: self.recipe.clone(),
            is_favorite,
        }
    }
}

fn normalize_image_url(url: String) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == url.len() {
        Some(url)
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Minutes {
    Whole(i64),
    Fraction(f64),
    Text(String),
}

/// Accepts integers, fractions and numeric strings, rounding to whole
/// minutes and clamping into `u32`. Anything else means unspecified.
fn deserialize_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = match Option::<Minutes>::deserialize(deserializer)? {
        None => 0,
        Some(Minutes::Whole(minutes)) => u32::try_from(minutes.max(0)).unwrap_or(u32::MAX),
        Some(Minutes::Fraction(minutes)) => fraction_to_minutes(minutes),
        Some(Minutes::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(fraction_to_minutes)
            .unwrap_or(0),
    };
    Ok(minutes)
}

fn fraction_to_minutes(minutes: f64) -> u32 {
    if minutes.is_finite() && minutes > 0.0 {
        // `as` saturates at u32::MAX
        minutes.round() as u32
    } else {
        0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lines {
    List(Vec<String>),
    Block(String),
}

/// Accepts either a list of strings or a single block of text.
///
/// A block is split into one entry per non-empty line.
fn deserialize_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lines>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Lines::List(lines)) => lines,
        Some(Lines::Block(block)) => block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    })
}

fn deserialize_image_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(normalize_image_url))
}
