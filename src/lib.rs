pub mod config;
pub mod engine;
pub mod ffi;
pub mod logging;
pub mod model;
pub mod parser;
pub mod query;
pub mod store;

pub use config::FinderConfig;
pub use engine::{DetailState, EngineError, ListState, RecipeEngine, RecipePool, ViewState};
pub use logging::init_logging;
pub use model::*;
pub use parser::parse_recipes;
pub use query::{GeminiGenerator, RecipeQuery, RecipeQueryService, TextGenerator};
pub use store::{FavoritesStore, FileStorage, MemoryStorage};

uniffi::setup_scaffolding!();
