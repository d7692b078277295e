use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::events::{EventBus, GameEvent};
use crate::inventory::{CleanableKind, InventorySnapshot};

/// Primary key for a tracked cleanable entity, assigned at registration and
/// never reused, including across resyncs. Display labels are only the
/// inbound matching heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CleanableId(u64);

impl CleanableId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TrackedCleanable {
    label: String,
    kind: CleanableKind,
}

/// Aggregate cleanup counters. `cleaned_* <= total_*` holds for any sequence
/// of notifications because each resolution removes one distinct remaining
/// entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total_dirt: u32,
    pub cleaned_dirt: u32,
    pub total_trash: u32,
    pub cleaned_trash: u32,
}

impl ProgressState {
    pub fn total(&self) -> u32 {
        self.total_dirt.saturating_add(self.total_trash)
    }

    pub fn cleaned(&self) -> u32 {
        self.cleaned_dirt.saturating_add(self.cleaned_trash)
    }

    pub fn remaining(&self) -> u32 {
        self.total().saturating_sub(self.cleaned())
    }

    pub fn is_complete(&self) -> bool {
        let total = self.total();
        total > 0 && self.cleaned() >= total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The notification matched a remaining entity and was counted.
    Resolved,
    /// The notification matched, and it was the last remaining entity.
    AllResolved,
    /// Duplicate or unknown notification; counters untouched.
    Unmatched,
}

/// Canonical "what's left to clean" state.
#[derive(Default)]
pub struct CleanupRegistry {
    next_id: u64,
    remaining: BTreeMap<CleanableId, TrackedCleanable>,
    progress: ProgressState,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> CleanableId {
        let id = CleanableId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Rebuilds all registry state from a fresh scan. Totals include entities
    /// that start pre-cleaned so they stay stable; only the rest enter the
    /// remaining set. Idempotent: calling it again fully replaces prior
    /// state, which is also the resync path.
    pub fn initialize(
        &mut self,
        snapshot: &InventorySnapshot,
        bus: &mut EventBus,
        missing_items_threshold: usize,
    ) {
        self.remaining.clear();
        let mut progress = ProgressState::default();
        for scan in &snapshot.cleanables {
            match scan.kind {
                CleanableKind::Dirt => progress.total_dirt = progress.total_dirt.saturating_add(1),
                CleanableKind::Trash => {
                    progress.total_trash = progress.total_trash.saturating_add(1)
                }
            }
            if scan.cleaned {
                match scan.kind {
                    CleanableKind::Dirt => {
                        progress.cleaned_dirt = progress.cleaned_dirt.saturating_add(1)
                    }
                    CleanableKind::Trash => {
                        progress.cleaned_trash = progress.cleaned_trash.saturating_add(1)
                    }
                }
            } else {
                let id = self.alloc_id();
                self.remaining.insert(
                    id,
                    TrackedCleanable {
                        label: scan.display_label(),
                        kind: scan.kind,
                    },
                );
            }
        }
        self.progress = progress;

        if self.progress.total() == 0 {
            warn!("no cleanable entities found in scene scan");
        } else {
            info!(
                total_dirt = self.progress.total_dirt,
                total_trash = self.progress.total_trash,
                remaining = self.remaining.len(),
                "cleanup registry initialized"
            );
        }

        self.publish_progress(bus);
        self.publish_missing_items_if_due(bus, missing_items_threshold);
    }

    /// Best-effort match of a caller-supplied display name against the
    /// remaining set: exact label first, then prefix, then substring. Within
    /// a tier the lowest id wins, so the heuristic is deterministic.
    fn match_remaining_id(&self, display_name: &str) -> Option<CleanableId> {
        let mut prefix_match = None;
        let mut substring_match = None;
        for (id, entry) in &self.remaining {
            if entry.label == display_name {
                return Some(*id);
            }
            if prefix_match.is_none() && entry.label.starts_with(display_name) {
                prefix_match = Some(*id);
            }
            if substring_match.is_none() && entry.label.contains(display_name) {
                substring_match = Some(*id);
            }
        }
        prefix_match.or(substring_match)
    }

    /// Records that a cleanup source finished its destruction sequence.
    /// Unknown or duplicate notifications are logged and ignored; they never
    /// corrupt counters.
    pub fn notify_resolved(
        &mut self,
        display_name: &str,
        bus: &mut EventBus,
        missing_items_threshold: usize,
    ) -> ResolveOutcome {
        let Some(id) = self.match_remaining_id(display_name) else {
            warn!(
                name = display_name,
                "cleanup notification matched no remaining entity"
            );
            return ResolveOutcome::Unmatched;
        };
        let Some(entry) = self.remaining.remove(&id) else {
            return ResolveOutcome::Unmatched;
        };
        match entry.kind {
            CleanableKind::Dirt => {
                self.progress.cleaned_dirt = self.progress.cleaned_dirt.saturating_add(1)
            }
            CleanableKind::Trash => {
                self.progress.cleaned_trash = self.progress.cleaned_trash.saturating_add(1)
            }
        }
        debug!(
            id = id.value(),
            label = entry.label.as_str(),
            cleaned = self.progress.cleaned(),
            total = self.progress.total(),
            "cleanable resolved"
        );

        self.publish_progress(bus);
        self.publish_missing_items_if_due(bus, missing_items_threshold);

        if self.progress.is_complete() {
            info!("all cleanable entities resolved");
            ResolveOutcome::AllResolved
        } else {
            ResolveOutcome::Resolved
        }
    }

    /// Compares tracked counters against a fresh scan and resyncs on any
    /// disagreement. Returns true when a resync ran. Safety net for heuristic
    /// matching drift, not a correctness guarantee on its own.
    pub fn validate_consistency(
        &mut self,
        snapshot: &InventorySnapshot,
        bus: &mut EventBus,
        missing_items_threshold: usize,
    ) -> bool {
        let actual = Self::progress_of_snapshot(snapshot);
        let remaining_matches = self.remaining.len() as u32 == actual.remaining();
        if actual == self.progress && remaining_matches {
            return false;
        }
        info!(
            tracked_cleaned = self.progress.cleaned(),
            tracked_total = self.progress.total(),
            actual_cleaned = actual.cleaned(),
            actual_total = actual.total(),
            "counter drift detected, resyncing registry"
        );
        self.initialize(snapshot, bus, missing_items_threshold);
        true
    }

    fn progress_of_snapshot(snapshot: &InventorySnapshot) -> ProgressState {
        let mut progress = ProgressState::default();
        for scan in &snapshot.cleanables {
            match scan.kind {
                CleanableKind::Dirt => {
                    progress.total_dirt = progress.total_dirt.saturating_add(1);
                    if scan.cleaned {
                        progress.cleaned_dirt = progress.cleaned_dirt.saturating_add(1);
                    }
                }
                CleanableKind::Trash => {
                    progress.total_trash = progress.total_trash.saturating_add(1);
                    if scan.cleaned {
                        progress.cleaned_trash = progress.cleaned_trash.saturating_add(1);
                    }
                }
            }
        }
        progress
    }

    /// Debug path: marks every remaining entity resolved in one step.
    pub fn force_complete_all(&mut self, bus: &mut EventBus) {
        self.remaining.clear();
        self.progress.cleaned_dirt = self.progress.total_dirt;
        self.progress.cleaned_trash = self.progress.total_trash;
        info!(total = self.progress.total(), "cleanup force-completed");
        self.publish_progress(bus);
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    pub fn remaining_labels(&self) -> Vec<String> {
        self.remaining
            .values()
            .map(|entry| entry.label.clone())
            .collect()
    }

    fn publish_progress(&self, bus: &mut EventBus) {
        bus.publish(&GameEvent::ProgressChanged {
            cleaned: self.progress.cleaned(),
            total: self.progress.total(),
        });
    }

    fn publish_missing_items_if_due(&self, bus: &mut EventBus, threshold: usize) {
        let remaining = self.remaining.len();
        if remaining > 0 && remaining <= threshold {
            bus.publish(&GameEvent::MissingItems {
                labels: self.remaining_labels(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::CleanableScan;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scan(name: &str, position: [f32; 3], kind: CleanableKind, cleaned: bool) -> CleanableScan {
        CleanableScan {
            name: name.to_string(),
            position,
            kind,
            cleaned,
        }
    }

    fn room_snapshot() -> InventorySnapshot {
        InventorySnapshot {
            cleanables: vec![
                scan("DirtSpot", [0.0, 0.0, 0.0], CleanableKind::Dirt, false),
                scan("DirtSpot", [3.0, 0.0, 1.0], CleanableKind::Dirt, false),
                scan("Soda Can", [1.0, 0.0, 2.0], CleanableKind::Trash, false),
                scan("Pizza Box", [2.0, 1.0, 2.0], CleanableKind::Trash, false),
            ],
            memory_values: Vec::new(),
        }
    }

    fn event_log(bus: &mut EventBus) -> Rc<RefCell<Vec<GameEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        bus.subscribe_all(move |event| sink.borrow_mut().push(event.clone()));
        log
    }

    fn initialized_registry(
        snapshot: &InventorySnapshot,
        threshold: usize,
    ) -> (CleanupRegistry, EventBus) {
        let mut registry = CleanupRegistry::new();
        let mut bus = EventBus::new();
        registry.initialize(snapshot, &mut bus, threshold);
        (registry, bus)
    }

    #[test]
    fn initialize_counts_pre_cleaned_entities_into_totals() {
        let mut snapshot = room_snapshot();
        snapshot.cleanables[0].cleaned = true;
        let (registry, _bus) = initialized_registry(&snapshot, 0);

        let progress = registry.progress();
        assert_eq!(progress.total_dirt, 2);
        assert_eq!(progress.cleaned_dirt, 1);
        assert_eq!(progress.total_trash, 2);
        assert_eq!(progress.cleaned_trash, 0);
        assert_eq!(registry.remaining_labels().len(), 3);
    }

    #[test]
    fn notify_resolved_matches_exact_label_first() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        let outcome = registry.notify_resolved("Soda Can_(1,0,2)", &mut bus, 0);
        assert_eq!(outcome, ResolveOutcome::Resolved);
        assert_eq!(registry.progress().cleaned_trash, 1);
    }

    #[test]
    fn notify_resolved_falls_back_to_prefix_then_substring() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);

        // Prefix: two DirtSpot labels remain, lowest id wins.
        assert_eq!(
            registry.notify_resolved("DirtSpot", &mut bus, 0),
            ResolveOutcome::Resolved
        );
        assert_eq!(registry.progress().cleaned_dirt, 1);
        assert!(registry
            .remaining_labels()
            .contains(&"DirtSpot_(3,0,1)".to_string()));

        // Substring: interior fragment of "Pizza Box_(2,1,2)".
        assert_eq!(
            registry.notify_resolved("zza Box", &mut bus, 0),
            ResolveOutcome::Resolved
        );
        assert_eq!(registry.progress().cleaned_trash, 1);
    }

    #[test]
    fn duplicate_and_unknown_notifications_leave_counters_untouched() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        registry.notify_resolved("Soda Can", &mut bus, 0);

        assert_eq!(
            registry.notify_resolved("Soda Can", &mut bus, 0),
            ResolveOutcome::Unmatched
        );
        assert_eq!(
            registry.notify_resolved("Rubber Duck", &mut bus, 0),
            ResolveOutcome::Unmatched
        );
        assert_eq!(registry.progress().cleaned(), 1);
        assert_eq!(registry.remaining_labels().len(), 3);
    }

    #[test]
    fn cleaned_never_exceeds_total_under_notification_floods() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        for _ in 0..20 {
            registry.notify_resolved("DirtSpot", &mut bus, 0);
            registry.notify_resolved("Soda Can", &mut bus, 0);
            registry.notify_resolved("Pizza Box", &mut bus, 0);
        }
        let progress = registry.progress();
        assert_eq!(progress.cleaned(), 4);
        assert_eq!(progress.total(), 4);
        assert!(progress.cleaned_dirt <= progress.total_dirt);
        assert!(progress.cleaned_trash <= progress.total_trash);
    }

    #[test]
    fn last_resolution_reports_all_resolved() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        registry.notify_resolved("DirtSpot_(0,0,0)", &mut bus, 0);
        registry.notify_resolved("DirtSpot_(3,0,1)", &mut bus, 0);
        registry.notify_resolved("Soda Can", &mut bus, 0);
        assert_eq!(
            registry.notify_resolved("Pizza Box", &mut bus, 0),
            ResolveOutcome::AllResolved
        );
        assert!(registry.progress().is_complete());
        assert!(registry.remaining_labels().is_empty());
    }

    #[test]
    fn missing_items_publishes_once_remaining_reaches_threshold() {
        let mut registry = CleanupRegistry::new();
        let mut bus = EventBus::new();
        let log = event_log(&mut bus);
        registry.initialize(&room_snapshot(), &mut bus, 2);

        assert!(!log
            .borrow()
            .iter()
            .any(|event| matches!(event, GameEvent::MissingItems { .. })));

        registry.notify_resolved("DirtSpot", &mut bus, 2);
        registry.notify_resolved("DirtSpot", &mut bus, 2);

        let missing: Vec<_> = log
            .borrow()
            .iter()
            .filter_map(|event| match event {
                GameEvent::MissingItems { labels } => Some(labels.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(
            missing[0],
            vec!["Soda Can_(1,0,2)".to_string(), "Pizza Box_(2,1,2)".to_string()]
        );
    }

    #[test]
    fn validate_consistency_resyncs_to_match_fresh_scan() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        registry.notify_resolved("Soda Can", &mut bus, 0);

        // The world moved on without telling us: one dirt spot destroyed by
        // an unrelated system, the can flagged cleaned, and a new trash item.
        let fresh = InventorySnapshot {
            cleanables: vec![
                scan("DirtSpot", [3.0, 0.0, 1.0], CleanableKind::Dirt, false),
                scan("Soda Can", [1.0, 0.0, 2.0], CleanableKind::Trash, true),
                scan("Pizza Box", [2.0, 1.0, 2.0], CleanableKind::Trash, false),
                scan("Old Sock", [5.0, 0.0, 0.0], CleanableKind::Trash, false),
            ],
            memory_values: Vec::new(),
        };

        assert!(registry.validate_consistency(&fresh, &mut bus, 0));
        let progress = registry.progress();
        assert_eq!(progress.total_dirt, 1);
        assert_eq!(progress.cleaned_dirt, 0);
        assert_eq!(progress.total_trash, 3);
        assert_eq!(progress.cleaned_trash, 1);
        assert_eq!(registry.remaining_labels().len(), 3);

        // A matching scan is a no-op.
        assert!(!registry.validate_consistency(&fresh, &mut bus, 0));
    }

    #[test]
    fn resync_never_reuses_ids() {
        let mut registry = CleanupRegistry::new();
        let mut bus = EventBus::new();
        let snapshot = room_snapshot();
        registry.initialize(&snapshot, &mut bus, 0);
        let first_round_max = registry.remaining.keys().next_back().copied();
        registry.initialize(&snapshot, &mut bus, 0);
        let second_round_min = registry.remaining.keys().next().copied();
        assert!(second_round_min > first_round_max);
    }

    #[test]
    fn force_complete_all_clears_the_remaining_set() {
        let (mut registry, mut bus) = initialized_registry(&room_snapshot(), 0);
        registry.force_complete_all(&mut bus);
        assert!(registry.progress().is_complete());
        assert!(registry.remaining_labels().is_empty());
    }
}
