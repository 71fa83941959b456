use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Level, RunResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub unlocked: bool,
    /// Best star count so far.
    pub stars: u8,
}

/// Which levels a player has unlocked and their best scores.
///
/// Lives only in memory. It is serializable so a caller can store it wherever
/// it likes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    levels: BTreeMap<u32, LevelProgress>,
}

impl Progress {
    /// Fresh progress with only the first level of `catalog` unlocked.
    pub fn new(catalog: &[Level]) -> Self {
        let mut progress = Progress::default();
        if let Some(first) = catalog.first() {
            progress.unlock(first.id());
        }
        progress
    }

    pub fn get(&self, level_id: u32) -> LevelProgress {
        self.levels.get(&level_id).copied().unwrap_or_default()
    }

    pub fn is_unlocked(&self, level_id: u32) -> bool {
        self.get(level_id).unlocked
    }

    pub fn total_stars(&self) -> u32 {
        self.levels.values().map(|p| u32::from(p.stars)).sum()
    }

    /// Marks a level as playable. Returns `true` if it was locked before.
    pub fn unlock(&mut self, level_id: u32) -> bool {
        let entry = self.levels.entry(level_id).or_default();
        !std::mem::replace(&mut entry.unlocked, true)
    }

    /// Records a finished run.
    ///
    /// Failed runs change nothing. A successful run keeps the better star count
    /// and unlocks the level that follows it in `catalog`. Returns the id of a
    /// level that became unlocked by this call, if any.
    pub fn record(&mut self, catalog: &[Level], result: &RunResult) -> Option<u32> {
        if !result.success {
            return None;
        }

        let entry = self.levels.entry(result.level_id).or_default();
        entry.unlocked = true;
        entry.stars = entry.stars.max(result.stars);

        let next = catalog
            .iter()
            .position(|level| level.id() == result.level_id)
            .and_then(|i| catalog.get(i + 1))
            .map(Level::id)?;
        if self.unlock(next) {
            info!(level = next, "level unlocked");
            Some(next)
        } else {
            None
        }
    }
}
