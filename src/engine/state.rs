use super::EngineError;
use crate::model::RecipeItem;
use std::sync::Arc;

/// State of one observed stream.
///
/// Transitions: `Uninitialized -> Loading -> Success | Failed`, then
/// `Success -> Loading`, `Success -> Success` and `Failed -> Loading` for as
/// long as the session lives.
#[derive(Debug, Clone)]
pub enum ViewState<T> {
    Uninitialized,
    Loading,
    Success(T),
    Failed(Arc<EngineError>),
}

/// State of the search results and favorites lists.
pub type ListState = ViewState<Vec<RecipeItem>>;

/// State of the selected recipe.
pub type DetailState = ViewState<RecipeItem>;

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        ViewState::Uninitialized
    }
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ViewState::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            ViewState::Failed(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Which list the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipePool {
    Favorites,
    Search,
}

impl RecipePool {
    /// Favorites while the query field is blank, search results otherwise.
    pub fn for_query(query: &str) -> Self {
        if query.trim().is_empty() {
            RecipePool::Favorites
        } else {
            RecipePool::Search
        }
    }
}
