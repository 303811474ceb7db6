//! Undo/redo history over whole-mask snapshots.
//!
//! Maintains two stacks:
//! - `undo`: masks as they were before each gesture (most recent at the back)
//! - `redo`: masks displaced by undo (most recent at the end)
//!
//! A snapshot is taken when a gesture starts, not on every pointer move.
//! Recording a new snapshot clears the redo stack, so history stays linear.
//! Every entry is a full raster copy, so the undo stack is bounded both by
//! entry count and by total bytes; the oldest entries are dropped first.

use std::collections::VecDeque;

use crate::mask::MaskStore;

/// Limits for the history stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept.
    pub max_entries: usize,
    /// Upper bound on bytes held by both stacks together.
    pub max_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaskHistory {
    undo: VecDeque<MaskStore>,
    redo: Vec<MaskStore>,
    config: HistoryConfig,
}

impl MaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> HistoryConfig {
        self.config
    }

    /// Snapshot `current` before a gesture modifies it.
    pub fn begin_gesture(&mut self, current: &MaskStore) {
        self.record(current.copy());
    }

    /// Push a pre-change snapshot and drop any redo entries.
    pub fn record(&mut self, snapshot: MaskStore) {
        self.undo.push_back(snapshot);
        self.redo.clear();
        self.prune();
        log::debug!("Undo: recorded snapshot ({} steps)", self.undo.len());
    }

    /// Restore the previous mask. Returns false when there is nothing to undo.
    pub fn undo(&mut self, current: &mut MaskStore) -> bool {
        let Some(previous) = self.undo.pop_back() else {
            return false;
        };
        let displaced = std::mem::replace(current, previous);
        self.redo.push(displaced);
        log::debug!(
            "Undo: {} left, {} redoable",
            self.undo.len(),
            self.redo.len()
        );
        true
    }

    /// Re-apply the most recently undone mask. Returns false when there is nothing to redo.
    pub fn redo(&mut self, current: &mut MaskStore) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let displaced = std::mem::replace(current, next);
        self.undo.push_back(displaced);
        log::debug!(
            "Redo: {} undoable, {} left",
            self.undo.len(),
            self.redo.len()
        );
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Bytes held by both stacks.
    pub fn memory_usage(&self) -> usize {
        self.undo
            .iter()
            .chain(self.redo.iter())
            .map(MaskStore::byte_len)
            .sum()
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        if self.undo.is_empty() && self.redo.is_empty() {
            return;
        }
        self.undo.clear();
        self.redo.clear();
        log::debug!("Undo history cleared");
    }

    fn prune(&mut self) {
        while self.undo.len() > self.config.max_entries {
            self.undo.pop_front();
        }
        while self.undo.len() > 1 && self.memory_usage() > self.config.max_bytes {
            self.undo.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImagePoint, Size};
    use crate::stroke::{StrokeMode, apply_stroke};

    fn dab(mask: &mut MaskStore, x: u32, y: u32, mode: StrokeMode) {
        let p = Some(ImagePoint::new(x, y));
        apply_stroke(mask, p, p, 3.0, mode);
    }

    /// Record then draw, the way a gesture does.
    fn gesture(history: &mut MaskHistory, mask: &mut MaskStore, x: u32, y: u32, mode: StrokeMode) {
        history.begin_gesture(mask);
        dab(mask, x, y, mode);
    }

    #[test]
    fn test_history_basic() {
        let mut history = MaskHistory::new();
        let mut mask = MaskStore::create(Size::new(32, 32)).unwrap();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.undo(&mut mask));
        assert!(!history.redo(&mut mask));

        gesture(&mut history, &mut mask, 10, 10, StrokeMode::Paint);
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert!(history.undo(&mut mask));
        assert!(mask.is_empty());
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn test_undo_then_redo_is_bit_identical() {
        let mut history = MaskHistory::new();
        let mut mask = MaskStore::create(Size::new(40, 40)).unwrap();
        gesture(&mut history, &mut mask, 5, 5, StrokeMode::Paint);
        gesture(&mut history, &mut mask, 20, 20, StrokeMode::Paint);
        gesture(&mut history, &mut mask, 6, 6, StrokeMode::Erase);
        let before = mask.copy();

        assert!(history.undo(&mut mask));
        assert_ne!(mask, before);
        assert!(history.redo(&mut mask));
        assert_eq!(mask, before);

        assert!(history.undo(&mut mask));
        assert!(history.undo(&mut mask));
        assert!(history.redo(&mut mask));
        assert!(history.redo(&mut mask));
        assert_eq!(mask, before);
    }

    #[test]
    fn test_new_gesture_clears_redo() {
        let mut history = MaskHistory::new();
        let mut mask = MaskStore::create(Size::new(32, 32)).unwrap();
        gesture(&mut history, &mut mask, 5, 5, StrokeMode::Paint);
        gesture(&mut history, &mut mask, 25, 25, StrokeMode::Paint);
        history.undo(&mut mask);
        history.undo(&mut mask);
        assert_eq!(history.redo_count(), 2);

        gesture(&mut history, &mut mask, 15, 15, StrokeMode::Paint);
        assert!(!history.can_redo());
        let after = mask.copy();
        assert!(!history.redo(&mut mask));
        assert_eq!(mask, after);
    }

    #[test]
    fn test_max_entries() {
        let mut history = MaskHistory::with_config(HistoryConfig {
            max_entries: 3,
            ..Default::default()
        });
        let mut mask = MaskStore::create(Size::new(16, 16)).unwrap();
        for i in 0..5 {
            gesture(&mut history, &mut mask, i, i, StrokeMode::Paint);
        }
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_memory_budget_keeps_at_least_one_step() {
        let mask_bytes = 16 * 16 * 4;
        let mut history = MaskHistory::with_config(HistoryConfig {
            max_entries: 100,
            max_bytes: mask_bytes * 2,
        });
        let mut mask = MaskStore::create(Size::new(16, 16)).unwrap();
        for i in 0..6 {
            gesture(&mut history, &mut mask, i, i, StrokeMode::Paint);
        }
        assert_eq!(history.undo_count(), 2);
        assert!(history.memory_usage() <= mask_bytes * 2);

        let tiny = HistoryConfig {
            max_entries: 100,
            max_bytes: 1,
        };
        let mut history = MaskHistory::with_config(tiny);
        gesture(&mut history, &mut mask, 1, 1, StrokeMode::Paint);
        gesture(&mut history, &mut mask, 2, 2, StrokeMode::Paint);
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = MaskHistory::new();
        let mut mask = MaskStore::create(Size::new(8, 8)).unwrap();
        gesture(&mut history, &mut mask, 1, 1, StrokeMode::Paint);
        gesture(&mut history, &mut mask, 2, 2, StrokeMode::Paint);
        history.undo(&mut mask);
        history.clear();
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 0);
        assert_eq!(history.memory_usage(), 0);
    }
}
