use super::recipe::Recipe;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The set of recipes the user has marked as favorite.
///
/// Membership is keyed by [`Recipe::id`]: an id appears at most once and
/// recipes without an id are never members. Insertion order is kept so the
/// favorites list renders in the order the user added them.
///
/// All operations are pure and return a new set, which makes them suitable
/// as transforms for [`crate::FavoritesStore::mutate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FavoritesDocument")]
pub struct FavoriteSet {
    recipes: Vec<Recipe>,
}

/// On-disk shape of the favorites document.
#[derive(Deserialize)]
struct FavoritesDocument {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

impl From<FavoritesDocument> for FavoriteSet {
    fn from(document: FavoritesDocument) -> Self {
        FavoriteSet::from_recipes(document.recipes)
    }
}

impl FavoriteSet {
    /// Builds a set from recipes, dropping unfavoritable recipes and
    /// duplicate ids (the first occurrence wins).
    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let mut seen = HashSet::new();
        let recipes = recipes
            .into_iter()
            .filter(|recipe| recipe.is_favoritable() && seen.insert(recipe.id().to_string()))
            .collect();
        FavoriteSet { recipes }
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.recipes.iter().any(|recipe| recipe.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.id() == id)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Returns the ids of all members.
    pub fn ids(&self) -> HashSet<String> {
        self.recipes.iter().map(|r| r.id().to_string()).collect()
    }

    /// Returns a set with `recipe` added. Adding an existing id or an
    /// unfavoritable recipe returns an unchanged copy.
    #[must_use]
    pub fn with(&self, recipe: Recipe) -> Self {
        let mut next = self.clone();
        if recipe.is_favoritable() && !self.contains(recipe.id()) {
            next.recipes.push(recipe);
        }
        next
    }

    /// Returns a set with the recipe identified by `id` removed.
    #[must_use]
    pub fn without(&self, id: &str) -> Self {
        FavoriteSet {
            recipes: self
                .recipes
                .iter()
                .filter(|recipe| recipe.id() != id)
                .cloned()
                .collect(),
        }
    }

    /// Flips membership of `recipe`: removes it if present, adds it otherwise.
    #[must_use]
    pub fn toggled(&self, recipe: &Recipe) -> Self {
        if self.contains(recipe.id()) {
            self.without(recipe.id())
        } else {
            self.with(recipe.clone())
        }
    }
}
