//! UniFFI bindings for cross-platform support (iOS, Android).
//!
//! The host app drives a [`RecipeSession`] and receives every state change of
//! the search, favorites and detail streams through a [`RecipeRenderTarget`]
//! it implements. Complex types are converted to plain records and enums
//! suitable for FFI.

use crate::config::{ConfigError, FinderConfig};
use crate::engine::{DetailState, EngineError, ListState, RecipeEngine, RecipePool, ViewState};
use crate::logging::init_logging as init_logging_internal;
use crate::model::{format_duration as format_duration_internal, Recipe, RecipeItem};
use crate::parser::parse_recipes as parse_recipes_internal;
use crate::query::{
    GeminiGenerator, QueryError, QueryValidator, RecipeQueryService, ValidationError, Validator,
};
use crate::store::{FavoritesStore, StoreError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// FFI-safe error type that wraps all possible errors.
#[derive(Debug, uniffi::Error, thiserror::Error)]
pub enum RecipeFinderError {
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Search error: {message}")]
    SearchError { message: String },

    #[error("Recipe not found: {message}")]
    NotFound { message: String },

    #[error("Favorites error: {message}")]
    FavoritesError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Session closed: {message}")]
    Closed { message: String },
}

impl From<ValidationError> for RecipeFinderError {
    fn from(e: ValidationError) -> Self {
        RecipeFinderError::InvalidQuery {
            message: e.to_string(),
        }
    }
}

impl From<QueryError> for RecipeFinderError {
    fn from(e: QueryError) -> Self {
        RecipeFinderError::SearchError {
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for RecipeFinderError {
    fn from(e: StoreError) -> Self {
        RecipeFinderError::FavoritesError {
            message: e.to_string(),
        }
    }
}

impl From<ConfigError> for RecipeFinderError {
    fn from(e: ConfigError) -> Self {
        RecipeFinderError::ConfigError {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for RecipeFinderError {
    fn from(e: std::io::Error) -> Self {
        RecipeFinderError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<EngineError> for RecipeFinderError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::Search(e) => e.into(),
            EngineError::Favorites(e) => e.into(),
            EngineError::NotFound { id } => RecipeFinderError::NotFound { message: id },
            EngineError::NotFavoritable => RecipeFinderError::FavoritesError { message },
            EngineError::Closed => RecipeFinderError::Closed { message },
        }
    }
}

/// FFI-safe representation of a recipe together with its favorite flag.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiRecipe {
    pub id: String,
    pub title: String,
    /// Preparation time in minutes, 0 if unknown
    pub duration_minutes: u32,
    /// Preparation time ready for display, e.g. "1 h 30 min."
    pub duration_text: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    /// Image URL, or none when a placeholder should be shown
    pub image_url: Option<String>,
    pub is_favorite: bool,
}

impl From<&Recipe> for FfiRecipe {
    fn from(r: &Recipe) -> Self {
        FfiRecipe {
            id: r.id().to_string(),
            title: r.title().to_string(),
            duration_minutes: r.duration_minutes(),
            duration_text: r.duration().map(format_duration_internal),
            ingredients: r.ingredients().to_vec(),
            instructions: r.instructions().to_vec(),
            image_url: r.image_url().map(str::to_string),
            is_favorite: false,
        }
    }
}

impl From<&RecipeItem> for FfiRecipe {
    fn from(item: &RecipeItem) -> Self {
        FfiRecipe {
            is_favorite: item.is_favorite(),
            ..FfiRecipe::from(item.recipe())
        }
    }
}

impl From<FfiRecipe> for Recipe {
    fn from(r: FfiRecipe) -> Self {
        Recipe::new(r.id, r.title)
            .with_duration_minutes(r.duration_minutes)
            .with_ingredients(r.ingredients)
            .with_instructions(r.instructions)
            .with_image_url(r.image_url.unwrap_or_default())
    }
}

/// FFI-safe state of the search results or favorites list.
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiListState {
    Uninitialized,
    Loading,
    Success { recipes: Vec<FfiRecipe> },
    Failed { message: String },
}

impl From<&ListState> for FfiListState {
    fn from(state: &ListState) -> Self {
        match state {
            ViewState::Uninitialized => FfiListState::Uninitialized,
            ViewState::Loading => FfiListState::Loading,
            ViewState::Success(items) => FfiListState::Success {
                recipes: items.iter().map(FfiRecipe::from).collect(),
            },
            ViewState::Failed(e) => FfiListState::Failed {
                message: e.to_string(),
            },
        }
    }
}

/// FFI-safe state of the selected recipe.
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiDetailState {
    Uninitialized,
    Loading,
    Success { recipe: FfiRecipe },
    Failed { message: String },
}

impl From<&DetailState> for FfiDetailState {
    fn from(state: &DetailState) -> Self {
        match state {
            ViewState::Uninitialized => FfiDetailState::Uninitialized,
            ViewState::Loading => FfiDetailState::Loading,
            ViewState::Success(item) => FfiDetailState::Success {
                recipe: FfiRecipe::from(item),
            },
            ViewState::Failed(e) => FfiDetailState::Failed {
                message: e.to_string(),
            },
        }
    }
}

/// Settings for a [`RecipeSession`]. Unset fields take their defaults.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionConfig {
    pub api_key: String,
    /// Path of the favorites document
    pub favorites_path: String,
    pub model: Option<String>,
    pub min_query_length: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
}

impl From<FfiSessionConfig> for FinderConfig {
    fn from(c: FfiSessionConfig) -> Self {
        let mut config = FinderConfig::new(c.api_key, c.favorites_path);
        if let Some(model) = c.model {
            config = config.with_model(model);
        }
        if let Some(length) = c.min_query_length {
            config = config.with_min_query_length(length as usize);
        }
        if let Some(secs) = c.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(temperature) = c.temperature {
            config = config.with_temperature(temperature);
        }
        config
    }
}

/// Implemented by the host app to draw state changes.
///
/// Calls arrive on a background thread, one per changed stream.
#[uniffi::export(callback_interface)]
pub trait RecipeRenderTarget: Send + Sync {
    fn render_search(&self, state: FfiListState);
    fn render_favorites(&self, state: FfiListState);
    fn render_selected(&self, state: FfiDetailState);
}

/// One recipe finder screen.
///
/// Owns the async runtime that runs searches and store I/O. No call blocks
/// on that runtime, so every method may be called from inside a render
/// callback: `toggle_favorite` is async, and the other commands return
/// immediately and report through the render target.
#[derive(uniffi::Object)]
pub struct RecipeSession {
    /// Taken on drop so the runtime can shut down from any thread.
    runtime: Option<Runtime>,
    handle: Handle,
    engine: Arc<RecipeEngine>,
    validator: QueryValidator,
    search_task: Mutex<Option<JoinHandle<()>>>,
}

#[uniffi::export]
impl RecipeSession {
    /// Creates a session searching with Gemini and persisting favorites at
    /// `config.favorites_path`.
    #[uniffi::constructor]
    pub fn new(
        config: FfiSessionConfig,
        target: Box<dyn RecipeRenderTarget>,
    ) -> Result<Arc<Self>, RecipeFinderError> {
        Self::from_config(config.into(), target)
    }

    /// Creates a session from environment variables (see `FinderConfig::from_env`).
    #[uniffi::constructor]
    pub fn from_env(target: Box<dyn RecipeRenderTarget>) -> Result<Arc<Self>, RecipeFinderError> {
        Self::from_config(FinderConfig::from_env()?, target)
    }

    /// Validates `query` and starts a search, cancelling the previous one.
    ///
    /// Blank and too short queries are rejected without touching the search
    /// results.
    pub fn search(&self, query: String) -> Result<(), RecipeFinderError> {
        self.validator.validate(&query)?;
        if self.engine.is_closed() {
            return Err(EngineError::Closed.into());
        }

        let engine = self.engine.clone();
        let handle = self
            .handle
            .spawn(async move { engine.search_recipes(&query).await });
        let previous = self
            .search_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Toggles the favorite membership of `recipe` and returns the new flag.
    pub async fn toggle_favorite(&self, recipe: FfiRecipe) -> Result<bool, RecipeFinderError> {
        let engine = self.engine.clone();
        let recipe = Recipe::from(recipe);
        let toggled = self
            .handle
            .spawn(async move { engine.on_favorite_click(&recipe).await })
            .await
            .map_err(|e| RecipeFinderError::Closed {
                message: e.to_string(),
            })?;
        Ok(toggled?)
    }

    /// Shows the recipe with `id` in the detail view.
    pub fn select_recipe(&self, id: String) {
        let engine = self.engine.clone();
        self.handle
            .spawn(async move { engine.load_selected_recipe(&id).await });
    }

    /// Reloads the favorites list from disk.
    pub fn load_favorites(&self) {
        let engine = self.engine.clone();
        self.handle
            .spawn(async move { engine.load_favorite_recipes().await });
    }

    /// True if the favorites list should be shown for this query text.
    pub fn shows_favorites(&self, query: String) -> bool {
        RecipePool::for_query(&query) == RecipePool::Favorites
    }

    /// The list to display for the current query text.
    pub fn visible_recipes(&self, query: String) -> Vec<FfiRecipe> {
        self.engine
            .visible_recipes(&query)
            .iter()
            .map(FfiRecipe::from)
            .collect()
    }

    /// True while a list is loading and a progress indicator should show.
    pub fn is_loading(&self) -> bool {
        self.engine.is_loading()
    }

    pub fn search_state(&self) -> FfiListState {
        FfiListState::from(&self.engine.search_state())
    }

    pub fn favorites_state(&self) -> FfiListState {
        FfiListState::from(&self.engine.favorites_state())
    }

    pub fn selected_state(&self) -> FfiDetailState {
        FfiDetailState::from(&self.engine.selected_state())
    }

    /// Ends the session. Pending work is dropped and nothing renders afterwards.
    pub fn close(&self) {
        self.engine.close();
        let pending = self
            .search_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }
    }
}

impl RecipeSession {
    fn from_config(
        config: FinderConfig,
        target: Box<dyn RecipeRenderTarget>,
    ) -> Result<Arc<Self>, RecipeFinderError> {
        let generator = GeminiGenerator::from_config(&config)?;
        let query = RecipeQueryService::new(Arc::new(generator));
        let favorites = FavoritesStore::shared(config.favorites_path.clone());
        let engine = Arc::new(RecipeEngine::new(Arc::new(query), favorites));
        Self::with_engine(engine, config.min_query_length, target)
    }

    fn with_engine(
        engine: Arc<RecipeEngine>,
        min_query_length: usize,
        target: Box<dyn RecipeRenderTarget>,
    ) -> Result<Arc<Self>, RecipeFinderError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let target: Arc<dyn RecipeRenderTarget> = Arc::from(target);

        forward(&runtime, engine.subscribe_search(), {
            let target = target.clone();
            move |state: &ListState| target.render_search(state.into())
        });
        forward(&runtime, engine.subscribe_favorites(), {
            let target = target.clone();
            move |state: &ListState| target.render_favorites(state.into())
        });
        forward(&runtime, engine.subscribe_selected(), move |state: &DetailState| {
            target.render_selected(state.into())
        });
        runtime.spawn({
            let engine = engine.clone();
            async move { engine.sync_with_store().await }
        });

        Ok(Arc::new(RecipeSession {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            engine,
            validator: QueryValidator::for_search(min_query_length),
            search_task: Mutex::new(None),
        }))
    }
}

impl Drop for RecipeSession {
    fn drop(&mut self) {
        self.close();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Renders every change of `updates` until its engine goes away.
fn forward<T, F>(runtime: &Runtime, mut updates: watch::Receiver<T>, render: F)
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) + Send + 'static,
{
    runtime.spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            render(&state);
        }
        debug!("render forwarding stopped");
    });
}

// ============================================================================
// Exported FFI Functions
// ============================================================================

/// Extracts recipes from a raw text-model response.
///
/// Never fails: text without a usable recipe array yields an empty list.
#[uniffi::export]
pub fn parse_recipes(text: String) -> Vec<FfiRecipe> {
    parse_recipes_internal(&text)
        .iter()
        .map(FfiRecipe::from)
        .collect()
}

/// Formats a duration in minutes for display, e.g. "1 d 2 h 5 min.".
#[uniffi::export]
pub fn format_duration(minutes: u32) -> String {
    format_duration_internal(minutes)
}

/// Installs the log subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: Option<String>, json: bool) -> bool {
    init_logging_internal(filter.as_deref(), json)
}

/// Returns the library version.
#[uniffi::export]
pub fn library_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
