use models::CategoryKey;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::session::SessionEvent;

/// Coalesces rapid direct edits of a category into one save.
///
/// Each `schedule` starts a timer tagged with a fresh generation; only the
/// timer carrying the newest generation fires a save.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    generations: HashMap<CategoryKey, u64>,
    pending: HashSet<CategoryKey>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generations: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// (Re)starts the window for `category`. Must run inside a tokio runtime.
    pub fn schedule(&mut self, category: CategoryKey, events: &UnboundedSender<SessionEvent>) -> u64 {
        let generation = self.generations.entry(category).or_insert(0);
        *generation += 1;
        let generation = *generation;
        self.pending.insert(category);

        let events = events.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // The session may be gone already.
            let _ = events.send(SessionEvent::DebounceElapsed {
                category,
                generation,
            });
        });
        generation
    }

    /// True when `generation` is the newest one for a pending category; the
    /// category is then no longer pending.
    pub fn fire(&mut self, category: CategoryKey, generation: u64) -> bool {
        let current = self.generations.get(&category).copied().unwrap_or(0);
        generation == current && self.pending.remove(&category)
    }

    pub fn is_pending(&self, category: CategoryKey) -> bool {
        self.pending.contains(&category)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops every pending save; timers still running will not fire.
    pub fn cancel_all(&mut self) {
        for category in self.pending.drain() {
            if let Some(generation) = self.generations.get_mut(&category) {
                *generation += 1;
            }
        }
    }
}
