//! Grid lifecycle state and the idle-unload timer.

use serde::{Deserialize, Serialize};

/// Coarse lifecycle of a grid slot.
///
/// `Invalid → Loading → Active ⇄ Idle → Removal → Unloading`. A grid in
/// `Removal` still exists but must be treated as absent for new insertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridState {
    Invalid,
    Loading,
    Active,
    Idle,
    Removal,
    Unloading,
}

impl GridState {
    /// Whether entities may be inserted into a grid in this state.
    pub fn accepts_objects(self) -> bool {
        matches!(self, GridState::Loading | GridState::Active | GridState::Idle)
    }
}

/// Countdown in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeTracker {
    expiry_ms: u64,
    remaining_ms: u64,
}

impl TimeTracker {
    pub fn new(expiry_ms: u64) -> Self {
        Self { expiry_ms, remaining_ms: expiry_ms }
    }

    pub fn update(&mut self, diff_ms: u64) {
        self.remaining_ms = self.remaining_ms.saturating_sub(diff_ms);
    }

    pub fn passed(&self) -> bool {
        self.remaining_ms == 0
    }

    pub fn reset(&mut self) {
        self.remaining_ms = self.expiry_ms;
    }

    pub fn remaining(&self) -> u64 {
        self.remaining_ms
    }
}

/// Per-grid bookkeeping for the unload decision.
#[derive(Debug, Clone)]
pub struct GridInfo {
    unload_timer: TimeTracker,
    unload_lock: bool,
}

impl GridInfo {
    pub fn new(expiry_ms: u64, unload_lock: bool) -> Self {
        Self {
            unload_timer: TimeTracker::new(expiry_ms),
            unload_lock,
        }
    }

    /// Called whenever an active reference is within activation range.
    pub fn reset_timer(&mut self) {
        self.unload_timer.reset();
    }

    /// Advances the idle timer and reports whether the grid may be unloaded.
    pub fn can_unload(&mut self, diff_ms: u64) -> bool {
        if self.unload_lock {
            return false;
        }
        self.unload_timer.update(diff_ms);
        self.unload_timer.passed()
    }

    pub fn set_unload_lock(&mut self, locked: bool) {
        self.unload_lock = locked;
    }

    pub fn is_unload_locked(&self) -> bool {
        self.unload_lock
    }

    pub fn remaining_ms(&self) -> u64 {
        self.unload_timer.remaining()
    }
}
