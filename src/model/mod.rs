mod duration;
mod favorites;
mod recipe;

pub use duration::format_duration;
pub use favorites::FavoriteSet;
pub use recipe::{Recipe, RecipeItem};
