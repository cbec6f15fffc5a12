//! Reconciliation of search results with the durable favorite set.
//!
//! A [`RecipeEngine`] belongs to one session (one screen, one app window). It
//! publishes three independent streams through `tokio::sync::watch`
//! channels, each with a single writer (the engine) and any number of
//! readers:
//!
//! - search results for the latest query
//! - the favorites list
//! - the recipe selected for the detail view
//!
//! Every record in those streams carries a favorite flag derived from the
//! [`FavoritesStore`]. Whenever the engine changes the store, or notices a
//! change made by another session, it re-derives the flags so that the three
//! streams never disagree for longer than one pass.
//!
//! Overlapping searches resolve as last-call-wins: every call takes a
//! generation number and a result is only published if no newer search has
//! started since. Closing the session cancels in-flight work and freezes the
//! streams.

use crate::model::{FavoriteSet, Recipe, RecipeItem};
use crate::query::{QueryError, RecipeQuery};
use crate::store::{FavoritesStore, StoreError};
use futures::StreamExt;
use std::collections::HashSet;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod state;

pub use state::{DetailState, ListState, RecipePool, ViewState};

/// Failures carried by [`ViewState::Failed`] or returned by engine calls.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Recipe search failed: {0}")]
    Search(#[from] QueryError),

    #[error("Recipe not found: {id}")]
    NotFound { id: String },

    #[error("Recipe has no id and cannot be favorited")]
    NotFavoritable,

    #[error("Failed to update favorites: {0}")]
    Favorites(#[from] StoreError),

    #[error("Session is closed")]
    Closed,
}

/// Session-scoped owner of the search, favorites and detail streams.
pub struct RecipeEngine {
    query: Arc<dyn RecipeQuery>,
    favorites: FavoritesStore,
    search: watch::Sender<ListState>,
    favorite_list: watch::Sender<ListState>,
    selected: watch::Sender<DetailState>,
    search_generation: AtomicU64,
    selected_generation: AtomicU64,
    /// Serializes favorite-flag derivation against favorite mutations.
    reconcile: Mutex<()>,
    session: CancellationToken,
}

impl RecipeEngine {
    pub fn new(query: Arc<dyn RecipeQuery>, favorites: FavoritesStore) -> Self {
        RecipeEngine {
            query,
            favorites,
            search: watch::Sender::new(ListState::default()),
            favorite_list: watch::Sender::new(ListState::default()),
            selected: watch::Sender::new(DetailState::default()),
            search_generation: AtomicU64::new(0),
            selected_generation: AtomicU64::new(0),
            reconcile: Mutex::new(()),
            session: CancellationToken::new(),
        }
    }

    pub fn subscribe_search(&self) -> watch::Receiver<ListState> {
        self.search.subscribe()
    }

    pub fn subscribe_favorites(&self) -> watch::Receiver<ListState> {
        self.favorite_list.subscribe()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<DetailState> {
        self.selected.subscribe()
    }

    pub fn search_state(&self) -> ListState {
        self.search.borrow().clone()
    }

    pub fn favorites_state(&self) -> ListState {
        self.favorite_list.borrow().clone()
    }

    pub fn selected_state(&self) -> DetailState {
        self.selected.borrow().clone()
    }

    /// Returns the list to show for the current text of the query field.
    ///
    /// Lists that are not in the `Success` state show as empty.
    pub fn visible_recipes(&self, query_text: &str) -> Vec<RecipeItem> {
        let stream = match RecipePool::for_query(query_text) {
            RecipePool::Favorites => &self.favorite_list,
            RecipePool::Search => &self.search,
        };
        let state = stream.borrow();
        state.data().cloned().unwrap_or_default()
    }

    /// True while either list is loading.
    pub fn is_loading(&self) -> bool {
        self.search.borrow().is_loading() || self.favorite_list.borrow().is_loading()
    }

    /// Runs a search and publishes its outcome on the search stream.
    ///
    /// The stream switches to `Loading` before this call first suspends. A
    /// result is dropped if a newer search started in the meantime or the
    /// session was closed.
    pub async fn search_recipes(&self, query: &str) {
        if self.is_closed() {
            debug!("search ignored, session closed");
            return;
        }

        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.search.send_replace(ViewState::Loading);
        info!(generation, "searching recipes");

        let result = tokio::select! {
            _ = self.session.cancelled() => {
                debug!(generation, "search abandoned, session closed");
                return;
            }
            result = self.query.search_recipes(query) => result,
        };

        let _guard = self.reconcile.lock().await;
        let next = match result {
            Ok(recipes) => {
                let favorite_ids = self.favorite_ids().await;
                debug!(generation, count = recipes.len(), "search succeeded");
                ViewState::Success(annotate(recipes, &favorite_ids))
            }
            Err(e) => {
                error!(generation, error = %e, "search failed");
                ViewState::Failed(Arc::new(EngineError::Search(e)))
            }
        };

        self.search.send_if_modified(|state| {
            if self.is_closed() || self.search_generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "dropping superseded search result");
                return false;
            }
            *state = next;
            true
        });
    }

    /// Toggles the favorite membership of `recipe`.
    ///
    /// After the durable write the favorites stream is reloaded from the store.
    /// In the search results and the detail view the clicked recipe takes the
    /// new membership, and every other record is re-derived from the reloaded
    /// set, so records changed by another session converge too.
    ///
    /// Returns whether the recipe is a favorite afterwards.
    pub async fn on_favorite_click(&self, recipe: &Recipe) -> Result<bool, EngineError> {
        if !recipe.is_favoritable() {
            warn!(title = recipe.title(), "ignoring favorite toggle for recipe without id");
            return Err(EngineError::NotFavoritable);
        }
        if self.is_closed() {
            return Err(EngineError::Closed);
        }

        let _guard = self.reconcile.lock().await;
        let id = recipe.id();
        let committed = self
            .favorites
            .mutate(|set| set.toggled(recipe))
            .await
            .map_err(|e| {
                warn!(id, error = %e, "favorite toggle failed");
                EngineError::Favorites(e)
            })?;
        let now_favorite = committed.contains(id);
        info!(id, now_favorite, "favorite toggled");

        if self.is_closed() {
            return Err(EngineError::Closed);
        }

        let reloaded = self.reload_favorites().await.unwrap_or(committed);
        let favorite_ids = reloaded.ids();
        self.search
            .send_if_modified(|state| patch_list(state, Some((id, now_favorite)), &favorite_ids));
        self.selected
            .send_if_modified(|state| patch_detail(state, Some((id, now_favorite)), &favorite_ids));

        Ok(now_favorite)
    }

    /// Publishes the recipe with `id` on the detail stream.
    ///
    /// Favorites are searched first, then the latest search results. Asking
    /// again for the recipe that is already shown does nothing.
    pub async fn load_selected_recipe(&self, id: &str) {
        if self.is_closed() {
            return;
        }
        let already_shown = matches!(&*self.selected.borrow(), ViewState::Success(item) if item.id() == id);
        if already_shown {
            debug!(id, "recipe already selected");
            return;
        }

        let generation = self.selected_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.selected.send_replace(ViewState::Loading);

        let favorites = self.favorites.snapshot().await;

        let found = favorites
            .get(id)
            .map(|recipe| RecipeItem::new(recipe.clone(), true))
            .or_else(|| {
                self.search.borrow().data().and_then(|items| {
                    items
                        .iter()
                        .find(|item| item.id() == id)
                        .map(|item| item.with_favorite(favorites.contains(id)))
                })
            });

        let next = match found {
            Some(item) => ViewState::Success(item),
            None => {
                warn!(id, "selected recipe not found");
                ViewState::Failed(Arc::new(EngineError::NotFound { id: id.to_owned() }))
            }
        };

        self.selected.send_if_modified(|state| {
            if self.is_closed() || self.selected_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });
    }

    /// Publishes the stored favorites on the favorites stream.
    ///
    /// A failed read is logged and leaves the stream as it was.
    pub async fn load_favorite_recipes(&self) {
        self.reload_favorites().await;
    }

    /// Follows changes to the favorites store made by any session and
    /// re-derives all three streams from them. Runs until the session closes.
    pub async fn sync_with_store(&self) {
        let mut updates = pin!(self.favorites.observe());
        loop {
            let set = tokio::select! {
                _ = self.session.cancelled() => break,
                next = updates.next() => match next {
                    Some(set) => set,
                    None => break,
                },
            };

            let _guard = self.reconcile.lock().await;
            if self.is_closed() {
                break;
            }
            let favorite_ids = set.ids();
            self.publish_favorites(&set);
            self.search
                .send_if_modified(|state| patch_list(state, None, &favorite_ids));
            self.selected
                .send_if_modified(|state| patch_detail(state, None, &favorite_ids));
        }
        debug!("stopped following favorites store");
    }

    /// Ends the session. In-flight work is cancelled and no stream changes
    /// afterwards.
    pub fn close(&self) {
        if !self.session.is_cancelled() {
            info!("closing recipe session");
            self.session.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_cancelled()
    }

    async fn reload_favorites(&self) -> Option<FavoriteSet> {
        match self.favorites.try_snapshot().await {
            Ok(set) => {
                if !self.is_closed() {
                    self.publish_favorites(&set);
                }
                Some(set)
            }
            Err(e) => {
                warn!(error = %e, "failed to load favorites, keeping previous state");
                None
            }
        }
    }

    fn publish_favorites(&self, set: &FavoriteSet) {
        let items = set
            .recipes()
            .iter()
            .map(|recipe| RecipeItem::new(recipe.clone(), true))
            .collect();
        self.favorite_list.send_replace(ViewState::Success(items));
    }

    async fn favorite_ids(&self) -> HashSet<String> {
        self.favorites.snapshot().await.ids()
    }
}

impl Drop for RecipeEngine {
    fn drop(&mut self) {
        self.session.cancel();
    }
}

fn annotate(recipes: Vec<Recipe>, favorite_ids: &HashSet<String>) -> Vec<RecipeItem> {
    recipes
        .into_iter()
        .map(|recipe| {
            let is_favorite = recipe.is_favoritable() && favorite_ids.contains(recipe.id());
            RecipeItem::new(recipe, is_favorite)
        })
        .collect()
}

/// Favorite flag an item should carry. `toggled` pins the flag of the
/// recipe that was just clicked.
fn derived_flag(
    item: &RecipeItem,
    toggled: Option<(&str, bool)>,
    favorite_ids: &HashSet<String>,
) -> bool {
    match toggled {
        Some((id, now_favorite)) if item.id() == id => now_favorite,
        _ => item.recipe().is_favoritable() && favorite_ids.contains(item.id()),
    }
}

fn patch_list(
    state: &mut ListState,
    toggled: Option<(&str, bool)>,
    favorite_ids: &HashSet<String>,
) -> bool {
    let ViewState::Success(items) = state else {
        return false;
    };
    let mut changed = false;
    for item in items.iter_mut() {
        let flag = derived_flag(item, toggled, favorite_ids);
        if flag != item.is_favorite() {
            *item = item.with_favorite(flag);
            changed = true;
        }
    }
    changed
}

fn patch_detail(
    state: &mut DetailState,
    toggled: Option<(&str, bool)>,
    favorite_ids: &HashSet<String>,
) -> bool {
    let ViewState::Success(item) = state else {
        return false;
    };
    let flag = derived_flag(item, toggled, favorite_ids);
    if flag == item.is_favorite() {
        return false;
    }
    *item = item.with_favorite(flag);
    true
}
