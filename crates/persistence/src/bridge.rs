use models::{CategoryKey, CategorySnapshot, ProjectionSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::ProjectionStore;

/// Monotonic per-category save versions.
///
/// A response is applied only when no newer save (or newer local edit) has
/// been issued for its category since it was sent.
#[derive(Debug, Default, Clone)]
pub struct VersionLedger {
    issued: HashMap<CategoryKey, u64>,
    applied: HashMap<CategoryKey, u64>,
}

impl VersionLedger {
    pub fn issue(&mut self, category: CategoryKey) -> u64 {
        let version = self.issued.entry(category).or_insert(0);
        *version += 1;
        *version
    }

    /// Makes every in-flight response for `category` stale.
    pub fn supersede(&mut self, category: CategoryKey) {
        self.issue(category);
    }

    pub fn latest_issued(&self, category: CategoryKey) -> u64 {
        self.issued.get(&category).copied().unwrap_or(0)
    }

    pub fn last_applied(&self, category: CategoryKey) -> u64 {
        self.applied.get(&category).copied().unwrap_or(0)
    }

    pub fn is_current(&self, category: CategoryKey, version: u64) -> bool {
        version >= self.latest_issued(category)
    }

    /// Records `version` as applied if it is still current.
    pub fn accept(&mut self, category: CategoryKey, version: u64) -> bool {
        if !self.is_current(category, version) || version < self.last_applied(category) {
            return false;
        }
        self.applied.insert(category, version);
        true
    }
}

/// A save that has been assigned a version and is ready to send.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub category: CategoryKey,
    pub version: u64,
    pub snapshot: CategorySnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The store's canonical copy, to overwrite local state with.
    Applied(CategorySnapshot),
    /// A newer save or edit exists for the category; the response was dropped.
    Stale { version: u64, latest: u64 },
    /// The write was dropped; local state is kept as unsaved.
    Failed(String),
}

/// Snapshots loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    pub projection: ProjectionSnapshot,
    pub categories: Vec<(CategoryKey, CategorySnapshot)>,
    pub failed: Vec<CategoryKey>,
}

/// Moves category snapshots between working state and the store.
pub struct PersistenceBridge {
    store: Arc<dyn ProjectionStore>,
    ledger: VersionLedger,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self {
            store,
            ledger: VersionLedger::default(),
        }
    }

    pub fn store(&self) -> Arc<dyn ProjectionStore> {
        Arc::clone(&self.store)
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    /// Loads one category; a failure is logged and yields zero-filled defaults.
    pub async fn load_category(&self, category: CategoryKey) -> (CategorySnapshot, bool) {
        match self.store.load(category).await {
            Ok(snapshot) => (snapshot, true),
            Err(err) => {
                warn!(%category, error = %err, "load failed; using zero-filled defaults");
                (CategorySnapshot::empty(category), false)
            }
        }
    }

    /// Loads every category, one call each.
    pub async fn load_all(&self) -> LoadedState {
        let mut state = LoadedState::default();
        for category in CategoryKey::ALL {
            let (snapshot, ok) = self.load_category(category).await;
            if !ok {
                state.failed.push(category);
            }
            match snapshot {
                CategorySnapshot::Projection(projection) => state.projection = projection,
                other => state.categories.push((category, other)),
            }
        }
        info!(failed = state.failed.len(), "loaded projection categories");
        state
    }

    pub fn begin_save(&mut self, category: CategoryKey, snapshot: CategorySnapshot) -> SaveRequest {
        let version = self.ledger.issue(category);
        SaveRequest {
            category,
            version,
            snapshot,
        }
    }

    pub fn supersede(&mut self, category: CategoryKey) {
        self.ledger.supersede(category);
    }

    /// Sends a prepared save; usable from a spawned task.
    pub async fn send(store: Arc<dyn ProjectionStore>, request: SaveRequest) -> Result<CategorySnapshot> {
        store.save(request.category, request.snapshot).await
    }

    /// Decides what to do with a save response.
    pub fn resolve(
        &mut self,
        category: CategoryKey,
        version: u64,
        result: std::result::Result<CategorySnapshot, String>,
    ) -> SaveOutcome {
        if !self.ledger.is_current(category, version) {
            return SaveOutcome::Stale {
                version,
                latest: self.ledger.latest_issued(category),
            };
        }
        match result {
            Ok(snapshot) => {
                self.ledger.accept(category, version);
                SaveOutcome::Applied(snapshot)
            }
            Err(message) => {
                warn!(%category, version, error = %message, "save failed; keeping local values");
                SaveOutcome::Failed(message)
            }
        }
    }

    /// Issues, sends and resolves one save, waiting for the response.
    pub async fn save_now(&mut self, category: CategoryKey, snapshot: CategorySnapshot) -> SaveOutcome {
        let request = self.begin_save(category, snapshot);
        let version = request.version;
        let result = Self::send(self.store(), request)
            .await
            .map_err(|e| e.to_string());
        self.resolve(category, version, result)
    }

    pub async fn clear_all(&mut self) -> Result<()> {
        self.store.clear_all().await?;
        for category in CategoryKey::ALL {
            self.ledger.supersede(category);
        }
        Ok(())
    }
}
