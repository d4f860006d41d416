use models::{
    BaseSeriesId, CategoryKey, CategorySnapshot, DerivedCategory, GrowthField, MonthlySeries,
    Scenario, Settings,
};
use projection_engine::ProjectionEngine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::bridge::{PersistenceBridge, SaveOutcome};
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::store::ProjectionStore;
use crate::verify::{SyncReport, SyncVerifier};

/// Asynchronous completions fed back into the session.
#[derive(Debug)]
pub enum SessionEvent {
    DebounceElapsed {
        category: CategoryKey,
        generation: u64,
    },
    SaveCompleted {
        category: CategoryKey,
        version: u64,
        result: std::result::Result<CategorySnapshot, String>,
    },
}

/// What the user sees next to a category.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Saved,
    Saving,
    Unsaved(String),
}

/// Single owner of the working projection state.
///
/// Edits are applied and fully recomputed synchronously; saves run as spawned
/// tasks whose completions come back as [`SessionEvent`]s, handled one at a
/// time. Direct edits of the `projection` aggregate are debounced, cascaded
/// derived categories are saved immediately.
pub struct ProjectionSession {
    engine: ProjectionEngine,
    bridge: PersistenceBridge,
    debouncer: Debouncer,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    status: HashMap<CategoryKey, SaveStatus>,
    in_flight: usize,
}

impl ProjectionSession {
    /// Loads every category, rebuilds the engine from the `projection`
    /// aggregate and re-saves derived categories whose stored copy disagrees.
    pub async fn open(store: Arc<dyn ProjectionStore>, settings: &Settings) -> Result<Self> {
        let bridge = PersistenceBridge::new(store);
        let loaded = bridge.load_all().await;
        let engine = ProjectionEngine::from_snapshot(&loaded.projection)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            engine,
            bridge,
            debouncer: Debouncer::new(Duration::from_millis(settings.debounce_ms)),
            events_tx,
            events_rx,
            status: HashMap::new(),
            in_flight: 0,
        };

        // Zero defaults from a failed projection load must not overwrite stored results.
        if !loaded.failed.contains(&CategoryKey::Projection) {
            for (category, persisted) in &loaded.categories {
                if loaded.failed.contains(category) {
                    continue;
                }
                if *persisted != session.engine.snapshot(*category) {
                    debug!(%category, "stored snapshot differs from recomputed values");
                    session.save_immediately(*category);
                }
            }
        }
        info!(pending_saves = session.in_flight, "projection session opened");
        Ok(session)
    }

    pub fn engine(&self) -> &ProjectionEngine {
        &self.engine
    }

    pub fn snapshot(&self, category: CategoryKey) -> CategorySnapshot {
        self.engine.snapshot(category)
    }

    pub fn status(&self, category: CategoryKey) -> SaveStatus {
        self.status.get(&category).cloned().unwrap_or(SaveStatus::Saved)
    }

    /// No save in flight and no debounced save waiting.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.debouncer.pending_count() == 0
    }

    // Direct edits

    pub fn edit_base(&mut self, id: BaseSeriesId, month: usize, value: f64) -> Result<Vec<CategoryKey>> {
        let before = self.engine.base().get(id);
        let changed = self.engine.set_base_value(id, month, value)?;
        let input_changed = self.engine.base().get(id) != before;
        Ok(self.after_direct_edit(input_changed, &changed))
    }

    pub fn edit_base_series(&mut self, id: BaseSeriesId, values: MonthlySeries) -> Vec<CategoryKey> {
        let before = self.engine.base().get(id);
        let changed = self.engine.set_base_series(id, values);
        let input_changed = self.engine.base().get(id) != before;
        self.after_direct_edit(input_changed, &changed)
    }

    pub fn edit_growth(&mut self, field: GrowthField, value: f64) -> Vec<CategoryKey> {
        let before = self.engine.growth();
        let changed = self.engine.set_growth(field, value);
        let input_changed = self.engine.growth() != before;
        self.after_direct_edit(input_changed, &changed)
    }

    /// Pins a derived cell. The pin is stored in the `projection` aggregate.
    pub fn set_override(
        &mut self,
        category: DerivedCategory,
        scenario: Scenario,
        month: usize,
        value: f64,
    ) -> Result<Vec<CategoryKey>> {
        let before = self.engine.overrides().get(category, scenario, month);
        let changed = self.engine.set_override(category, scenario, month, value)?;
        let input_changed = self.engine.overrides().get(category, scenario, month) != before;
        Ok(self.after_direct_edit(input_changed, &changed))
    }

    /// Wipes the store, then local inputs and pins. If the store refuses,
    /// nothing local is touched and the error is returned.
    ///
    /// Saves already in flight are awaited first so none of them can land
    /// after the wipe.
    pub async fn clear_all(&mut self) -> Result<()> {
        self.drain_in_flight().await;
        self.bridge.clear_all().await?;
        self.debouncer.cancel_all();
        self.engine.clear_all();
        self.status.clear();
        info!("cleared all projection data");
        Ok(())
    }

    fn after_direct_edit(&mut self, input_changed: bool, changed: &[DerivedCategory]) -> Vec<CategoryKey> {
        let mut touched = Vec::new();
        if input_changed {
            self.schedule_debounced(CategoryKey::Projection);
            touched.push(CategoryKey::Projection);
        }
        for key in ProjectionEngine::keys_for(changed) {
            self.save_immediately(key);
            touched.push(key);
        }
        touched
    }

    fn schedule_debounced(&mut self, category: CategoryKey) {
        // A response for an older save must not clobber this newer edit.
        self.bridge.supersede(category);
        self.debouncer.schedule(category, &self.events_tx);
        self.status.insert(category, SaveStatus::Saving);
    }

    fn save_immediately(&mut self, category: CategoryKey) {
        let request = self.bridge.begin_save(category, self.engine.snapshot(category));
        let store = self.bridge.store();
        let events = self.events_tx.clone();
        self.status.insert(category, SaveStatus::Saving);
        self.in_flight += 1;

        tokio::spawn(async move {
            let version = request.version;
            let result = PersistenceBridge::send(store, request)
                .await
                .map_err(|e| e.to_string());
            let _ = events.send(SessionEvent::SaveCompleted {
                category,
                version,
                result,
            });
        });
    }

    // Event processing

    /// Handles one event. Returns the save outcome when the event was a completion.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<(CategoryKey, SaveOutcome)> {
        match event {
            SessionEvent::DebounceElapsed {
                category,
                generation,
            } => {
                if self.debouncer.fire(category, generation) {
                    self.save_immediately(category);
                }
                None
            }
            SessionEvent::SaveCompleted {
                category,
                version,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let outcome = self.bridge.resolve(category, version, result);
                match &outcome {
                    SaveOutcome::Applied(canonical) => {
                        self.status.insert(category, SaveStatus::Saved);
                        let changed = self.engine.apply_snapshot(category, canonical);
                        for key in ProjectionEngine::keys_for(&changed) {
                            self.save_immediately(key);
                        }
                    }
                    SaveOutcome::Stale { version, latest } => {
                        debug!(%category, version, latest, "dropped stale save response");
                    }
                    SaveOutcome::Failed(message) => {
                        self.status
                            .insert(category, SaveStatus::Unsaved(message.clone()));
                    }
                }
                Some((category, outcome))
            }
        }
    }

    /// Waits for and handles the next event.
    pub async fn process_next(&mut self) -> Option<(CategoryKey, SaveOutcome)> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event)
    }

    /// Processes events until no save is in flight. Debounced saves stay pending.
    async fn drain_in_flight(&mut self) {
        while self.in_flight > 0 {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle_event(event);
        }
    }

    /// Processes events until no save is pending or in flight.
    pub async fn settle(&mut self) -> Vec<(CategoryKey, SaveOutcome)> {
        let mut outcomes = Vec::new();
        while !self.is_idle() {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            if let Some(outcome) = self.handle_event(event) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Compares working state against the store, category by category.
    pub async fn verify_all(&self) -> Result<Vec<SyncReport>> {
        SyncVerifier::new(self.bridge.store())
            .verify_all(&self.engine)
            .await
    }
}
