use rand::Rng;
use serde::Serialize;

use crate::domain::activity::{adjusted_priority, round_priority, Activity};
use crate::store::{ActivityStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub activity: String,
    pub priority: f64,
    pub min_roll: f64,
}

/// Priority-aware operations over whichever store is active.
pub struct ActivityService<'a> {
    store: &'a dyn ActivityStore,
}

impl<'a> ActivityService<'a> {
    pub fn new(store: &'a dyn ActivityStore) -> Self {
        Self { store }
    }

    pub fn list_all(&self) -> Result<Vec<Activity>, StoreError> {
        self.store.list_all()
    }

    pub fn get(&self, name: &str) -> Result<Option<Activity>, StoreError> {
        self.store.get(name)
    }

    pub fn suggest(&self) -> Result<Option<Suggestion>, StoreError> {
        self.suggest_with(&mut rand::thread_rng())
    }

    /// Rolls a threshold in `[0, max_priority]` on a 0.1 grid and picks a
    /// random activity at or above it, so higher priorities win more often.
    pub fn suggest_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<Suggestion>, StoreError> {
        let max = self.store.max_priority()?;
        if max <= 0.0 {
            return Ok(None);
        }
        let steps = (max * 10.0).round() as i64;
        let min_roll = round_priority(rng.gen_range(0..=steps) as f64 / 10.0).min(max);
        let picked = self.store.select_weighted(min_roll)?;
        Ok(picked.map(|activity| Suggestion {
            activity: activity.name,
            priority: activity.priority,
            min_roll,
        }))
    }

    pub fn add(&self, name: &str, priority: f64) -> Result<(), StoreError> {
        self.store.add(name, priority)
    }

    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.store.delete(name)
    }

    /// Returns the stored priority after rounding and clamping.
    pub fn adjust_priority(&self, name: &str, delta: f64) -> Result<f64, StoreError> {
        let current = self
            .store
            .get(name)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let next = adjusted_priority(current.priority, delta);
        self.store.set_priority(name, next)?;
        Ok(next)
    }
}
