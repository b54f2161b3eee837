//! # Visibility Determination
//!
//! Decides whether one entity may observe another. The predicate is the conjunction of:
//!
//! 1. Same map and overlapping phase masks
//! 2. Distance within the pair's sight range (the larger of both parties' ranges)
//! 3. Target not hidden outright (never-visible, despawned)
//! 4. Every active stealth and invisibility channel of the target detected by the observer
//!
//! Rule 4 is skipped for observers that always see the target: itself, group members,
//! its owner or charmer, and game masters.

use crate::config::VisibilityConfig;
use crate::object::WorldObject;

/// Stealth channels.
pub mod stealth_type {
    pub const GENERAL: usize = 0;
    pub const TRAP: usize = 1;
    pub const COUNT: usize = 2;
}

/// Invisibility channels.
pub mod invisibility_type {
    pub const GENERAL: usize = 0;
    pub const UNK1: usize = 1;
    pub const UNK2: usize = 2;
    pub const TRAP: usize = 3;
    pub const UNK4: usize = 4;
    pub const UNK5: usize = 5;
    pub const DRUNK: usize = 6;
    pub const UNK7: usize = 7;
    pub const COUNT: usize = 8;
}

/// Independent magnitudes per detection channel plus a mask of active channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionChannels<const N: usize> {
    values: [i32; N],
    flags: u32,
}

impl<const N: usize> Default for DetectionChannels<N> {
    fn default() -> Self {
        Self { values: [0; N], flags: 0 }
    }
}

impl<const N: usize> DetectionChannels<N> {
    pub fn add_flag(&mut self, channel: usize) {
        assert!(channel < N, "detection channel {channel} out of range");
        self.flags |= 1 << channel;
    }

    pub fn del_flag(&mut self, channel: usize) {
        assert!(channel < N, "detection channel {channel} out of range");
        self.flags &= !(1 << channel);
    }

    pub fn has_flag(&self, channel: usize) -> bool {
        channel < N && self.flags & (1 << channel) != 0
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn value(&self, channel: usize) -> i32 {
        self.values[channel]
    }

    pub fn set_value(&mut self, channel: usize, value: i32) {
        self.values[channel] = value;
    }

    pub fn add_value(&mut self, channel: usize, delta: i32) {
        self.values[channel] += delta;
    }

    /// Active channels in ascending order.
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N).filter(move |&channel| self.has_flag(channel))
    }
}

pub type StealthChannels = DetectionChannels<{ stealth_type::COUNT }>;
pub type InvisibilityChannels = DetectionChannels<{ invisibility_type::COUNT }>;

/// Per-entity stealth, invisibility and sight state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityState {
    pub stealth: StealthChannels,
    pub stealth_detect: StealthChannels,
    pub invisibility: InvisibilityChannels,
    pub invisibility_detect: InvisibilityChannels,
    /// Extra sight range from effects (far sight, large models). Zero when unused.
    pub sight_extension: f32,
    pub never_visible: bool,
    /// Set while a despawned entity lingers until its removal is drained.
    pub despawn_invisible: bool,
}

impl VisibilityState {
    /// Whether `observer` detects every active stealth and invisibility channel of `self`.
    pub fn detected_by(&self, observer: &VisibilityState) -> bool {
        let stealth_ok = self
            .stealth
            .active()
            .all(|channel| observer.stealth_detect.value(channel) >= self.stealth.value(channel));
        if !stealth_ok {
            return false;
        }
        self.invisibility.active().all(|channel| {
            observer.invisibility_detect.has_flag(channel)
                && observer.invisibility_detect.value(channel) >= self.invisibility.value(channel)
        })
    }
}

/// Sight range an entity contributes to a pair check.
pub fn sight_range(object: &WorldObject, config: &VisibilityConfig) -> f32 {
    let base = if object.is_far_visible() {
        config.visibility_distance.max(config.world_object_visibility_distance)
    } else {
        config.visibility_distance
    };
    base.max(object.visibility.sight_extension.min(config.world_object_visibility_distance))
}

/// Range used for a pair: the larger of both parties' sight ranges.
pub fn pair_sight_range(observer: &WorldObject, target: &WorldObject, config: &VisibilityConfig) -> f32 {
    sight_range(observer, config).max(sight_range(target, config))
}

/// Observers that bypass stealth and invisibility checks for `target`.
pub fn always_sees(observer: &WorldObject, target: &WorldObject) -> bool {
    if observer.guid() == target.guid() || observer.is_game_master() {
        return true;
    }
    if let (Some(a), Some(b)) = (observer.group_id, target.group_id) {
        if a == b {
            return true;
        }
    }
    let observer_guid = observer.guid();
    target.owner_guid() == Some(observer_guid) || target.charmer_guid() == Some(observer_guid)
}

/// Full visibility predicate for one (observer, target) pair.
pub fn can_see(observer: &WorldObject, target: &WorldObject, config: &VisibilityConfig) -> bool {
    if observer.guid() == target.guid() {
        return true;
    }
    if !observer.is_in_world() || !target.is_in_world() || observer.current_map() != target.current_map() {
        return false;
    }
    if observer.phase_mask() & target.phase_mask() == 0 {
        return false;
    }
    if target.visibility.never_visible || target.visibility.despawn_invisible {
        return false;
    }
    let distance = observer.position().distance(&target.position());
    if distance > pair_sight_range(observer, target, config) {
        return false;
    }
    always_sees(observer, target) || target.visibility.detected_by(&observer.visibility)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stealth_requires_matching_detection() {
        let mut target = VisibilityState::default();
        target.stealth.add_flag(stealth_type::GENERAL);
        target.stealth.set_value(stealth_type::GENERAL, 50);
        let mut observer = VisibilityState::default();
        assert!(!target.detected_by(&observer));
        observer.stealth_detect.set_value(stealth_type::GENERAL, 50);
        assert!(target.detected_by(&observer));
    }

    #[test]
    fn channels_are_independent() {
        let mut target = VisibilityState::default();
        target.invisibility.add_flag(invisibility_type::GENERAL);
        target.invisibility.set_value(invisibility_type::GENERAL, 10);
        target.invisibility.add_flag(invisibility_type::DRUNK);
        target.invisibility.set_value(invisibility_type::DRUNK, 30);

        let mut observer = VisibilityState::default();
        observer.invisibility_detect.add_flag(invisibility_type::GENERAL);
        observer.invisibility_detect.set_value(invisibility_type::GENERAL, 100);
        assert!(!target.detected_by(&observer));

        observer.invisibility_detect.add_flag(invisibility_type::DRUNK);
        observer.invisibility_detect.set_value(invisibility_type::DRUNK, 29);
        assert!(!target.detected_by(&observer));
        observer.invisibility_detect.add_value(invisibility_type::DRUNK, 1);
        assert!(target.detected_by(&observer));
    }

    #[test]
    fn inactive_channel_values_are_ignored() {
        let mut target = VisibilityState::default();
        target.stealth.set_value(stealth_type::TRAP, 500);
        assert!(target.detected_by(&VisibilityState::default()));
    }
}
