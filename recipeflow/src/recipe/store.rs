//! Concurrent store of live recipes.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use super::state::Recipe;
use crate::messages::{OrderId, RecipeId};

/// Shared handle to one live recipe.
///
/// The mutex serializes every mutation of a single recipe; handlers for
/// different recipes proceed in parallel. Never hold it across an `.await`
/// or while inserting into or removing from the store.
pub type RecipeHandle = Arc<Mutex<Recipe>>;

/// Memory-only map from recipe id to live recipe.
///
/// Entries exist only between order intake and the terminal transition.
/// Nothing survives a process restart.
#[derive(Debug, Default)]
pub struct RecipeStore {
    recipes: DashMap<RecipeId, RecipeHandle>,
}

impl RecipeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a recipe and returns its handle.
    pub fn insert(&self, recipe: Recipe) -> RecipeHandle {
        let id = recipe.id().clone();
        let handle = Arc::new(Mutex::new(recipe));
        self.recipes.insert(id, Arc::clone(&handle));
        handle
    }

    /// Looks up a recipe.
    #[must_use]
    pub fn get(&self, id: &RecipeId) -> Option<RecipeHandle> {
        self.recipes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes a recipe. Removing an absent id is a no-op.
    pub fn remove(&self, id: &RecipeId) -> Option<RecipeHandle> {
        self.recipes.remove(id).map(|(_, handle)| handle)
    }

    /// Returns true if a recipe with this id is live.
    #[must_use]
    pub fn contains(&self, id: &RecipeId) -> bool {
        self.recipes.contains_key(id)
    }

    /// Finds the live recipe serving an order.
    #[must_use]
    pub fn find_by_order(&self, order_id: &OrderId) -> Option<RecipeId> {
        self.recipes
            .iter()
            .find(|entry| entry.value().lock().order_id() == order_id)
            .map(|entry| entry.key().clone())
    }

    /// Returns the ids of all live recipes.
    #[must_use]
    pub fn ids(&self) -> Vec<RecipeId> {
        self.recipes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of live recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Returns true if no recipe is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Goal, LinkBundle};
    use crate::recipe::Order;

    fn recipe(id: &str, order: &str) -> Recipe {
        Recipe::new(
            RecipeId::new(id),
            &Order::new(order, "shop", Goal::Forecast),
            &[Goal::Forecast],
            LinkBundle::new(),
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let store = RecipeStore::new();
        assert!(store.is_empty());

        store.insert(recipe("r-1", "o-1"));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&RecipeId::new("r-1")));

        let handle = store.get(&RecipeId::new("r-1")).unwrap();
        assert_eq!(handle.lock().order_id().as_str(), "o-1");

        assert!(store.remove(&RecipeId::new("r-1")).is_some());
        assert!(store.get(&RecipeId::new("r-1")).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = RecipeStore::new();
        store.insert(recipe("r-1", "o-1"));

        assert!(store.remove(&RecipeId::new("r-1")).is_some());
        assert!(store.remove(&RecipeId::new("r-1")).is_none());
        assert!(store.remove(&RecipeId::new("never")).is_none());
    }

    #[test]
    fn test_find_by_order() {
        let store = RecipeStore::new();
        store.insert(recipe("r-1", "o-1"));
        store.insert(recipe("r-2", "o-2"));

        assert_eq!(
            store.find_by_order(&OrderId::new("o-2")),
            Some(RecipeId::new("r-2"))
        );
        assert_eq!(store.find_by_order(&OrderId::new("o-3")), None);

        let mut ids = store.ids();
        ids.sort();
        assert_eq!(ids, vec![RecipeId::new("r-1"), RecipeId::new("r-2")]);
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Arc::new(RecipeStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.insert(recipe(&format!("r-{i}"), &format!("o-{i}")));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
