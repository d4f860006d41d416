use async_trait::async_trait;
use models::{CategoryKey, CategorySnapshot};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::error::{PersistenceError, Result};

/// Keyed store holding one snapshot per category.
/// This abstraction allows swapping between the HTTP API and an in-process store.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    async fn load(&self, category: CategoryKey) -> Result<CategorySnapshot>;
    /// Writes a full snapshot and returns the store's canonical copy of it.
    async fn save(&self, category: CategoryKey, snapshot: CategorySnapshot) -> Result<CategorySnapshot>;
    /// Wipes every category.
    async fn clear_all(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct FailurePlan {
    loads: HashSet<CategoryKey>,
    saves: HashSet<CategoryKey>,
    clear: bool,
}

/// Store kept in process memory. Canonicalizes like the HTTP server does and
/// can be told to fail specific calls.
#[derive(Debug, Default)]
pub struct InMemoryProjectionStore {
    data: RwLock<HashMap<CategoryKey, CategorySnapshot>>,
    failures: RwLock<FailurePlan>,
    save_calls: AtomicUsize,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, category: CategoryKey, snapshot: CategorySnapshot) {
        self.data.write().await.insert(category, snapshot);
    }

    pub async fn get(&self, category: CategoryKey) -> Option<CategorySnapshot> {
        self.data.read().await.get(&category).cloned()
    }

    pub async fn fail_loads(&self, category: CategoryKey) {
        self.failures.write().await.loads.insert(category);
    }

    pub async fn fail_saves(&self, category: CategoryKey) {
        self.failures.write().await.saves.insert(category);
    }

    pub async fn fail_clear(&self, fail: bool) {
        self.failures.write().await.clear = fail;
    }

    /// Number of `save` calls received, failed ones included.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn load(&self, category: CategoryKey) -> Result<CategorySnapshot> {
        if self.failures.read().await.loads.contains(&category) {
            return Err(PersistenceError::Unavailable(format!("load {category}")));
        }
        Ok(self
            .data
            .read()
            .await
            .get(&category)
            .cloned()
            .unwrap_or_else(|| CategorySnapshot::empty(category)))
    }

    async fn save(&self, category: CategoryKey, snapshot: CategorySnapshot) -> Result<CategorySnapshot> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.read().await.saves.contains(&category) {
            return Err(PersistenceError::Unavailable(format!("save {category}")));
        }
        let canonical = snapshot.rounded();
        self.data.write().await.insert(category, canonical.clone());
        Ok(canonical)
    }

    async fn clear_all(&self) -> Result<()> {
        if self.failures.read().await.clear {
            return Err(PersistenceError::Unavailable("clear-all".to_string()));
        }
        self.data.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{MonthlySeries, ScenarioTriple};

    #[tokio::test]
    async fn test_absent_category_loads_empty() {
        let store = InMemoryProjectionStore::new();
        let snap = store.load(CategoryKey::Budget).await.unwrap();
        assert_eq!(snap, CategorySnapshot::empty(CategoryKey::Budget));
    }

    #[tokio::test]
    async fn test_save_returns_canonical_copy() {
        let store = InMemoryProjectionStore::new();
        let triple = ScenarioTriple {
            previsto: MonthlySeries::filled(1.234),
            ..ScenarioTriple::default()
        };
        let saved = store
            .save(CategoryKey::Mkt, CategorySnapshot::Triple(triple))
            .await
            .unwrap();
        match &saved {
            CategorySnapshot::Triple(t) => assert_eq!(t.previsto.get(0), 1.23),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.get(CategoryKey::Mkt).await, Some(saved));
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryProjectionStore::new();
        store.fail_saves(CategoryKey::Budget).await;
        store.fail_clear(true).await;
        assert!(store
            .save(CategoryKey::Budget, CategorySnapshot::empty(CategoryKey::Budget))
            .await
            .is_err());
        assert!(store.clear_all().await.is_err());
        assert!(store.get(CategoryKey::Budget).await.is_none());
    }
}
