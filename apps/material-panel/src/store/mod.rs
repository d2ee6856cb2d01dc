//! Client-side mirror of host-owned material state.
//!
//! Authoritative data only ever arrives as a whole [`Snapshot`]. Local edits
//! are applied optimistically and are overwritten by the next snapshot.

mod refresh;

use std::sync::Arc;

use panel_proto::{FlagDelta, KindDictionary, LogEntry, Row, Snapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use refresh::{RefreshScheduler, RefreshState};

pub type SharedStore = Arc<Mutex<StateStore>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    #[default]
    Materials,
    Samples,
    Hidden,
    Logs,
}

/// Cheap summary the watchdog compares between ticks to skip redundant renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFingerprint {
    pub active_view: ActiveView,
    pub entity_count: usize,
    pub kind_count: usize,
}

#[derive(Debug, Default)]
pub struct StateStore {
    rows: Vec<Row>,
    kinds: KindDictionary,
    logs: Vec<LogEntry>,
    selection: Option<Row>,
    active_view: ActiveView,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn kinds(&self) -> &KindDictionary {
        &self.kinds
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn selection(&self) -> Option<&Row> {
        self.selection.as_ref()
    }

    pub fn active_view(&self) -> ActiveView {
        self.active_view
    }

    pub fn set_active_view(&mut self, view: ActiveView) {
        self.active_view = view;
    }

    pub fn row(&self, id: u64) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn kind_label(&self, row: &Row) -> Option<&str> {
        row.kind
            .as_deref()
            .and_then(|kind| self.kinds.get(kind))
            .map(String::as_str)
    }

    /// Replace rows, kinds and logs wholesale. A selection whose id survives is
    /// swapped for the fresh row; one whose id vanished is kept as-is.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) {
        let Snapshot {
            entries,
            kinds,
            logs,
        } = snapshot;
        self.rows = entries;
        self.kinds = kinds;
        self.logs = logs;

        if let Some(selected_id) = self.selection.as_ref().map(|row| row.id) {
            match self.rows.iter().find(|row| row.id == selected_id) {
                Some(fresh) => self.selection = Some(fresh.clone()),
                None => debug!(
                    target: "panel.store",
                    id = selected_id,
                    "selected row missing from snapshot; keeping stale selection"
                ),
            }
        }

        debug!(
            target: "panel.store",
            rows = self.rows.len(),
            kinds = self.kinds.len(),
            logs = self.logs.len(),
            "snapshot replaced"
        );
    }

    /// Rows with a kind that are not hidden.
    pub fn visible_rows(&self) -> Vec<&Row> {
        self.rows
            .iter()
            .filter(|row| row.is_classified() && !row.flags.hidden)
            .collect()
    }

    pub fn sample_rows(&self) -> Vec<&Row> {
        self.rows
            .iter()
            .filter(|row| row.is_classified() && !row.flags.hidden && row.flags.sample)
            .collect()
    }

    /// Hidden rows plus every row that has no kind yet.
    pub fn hidden_rows(&self) -> Vec<&Row> {
        self.rows
            .iter()
            .filter(|row| row.flags.hidden || !row.is_classified())
            .collect()
    }

    pub fn rows_for(&self, view: ActiveView) -> Vec<&Row> {
        match view {
            ActiveView::Materials => self.visible_rows(),
            ActiveView::Samples => self.sample_rows(),
            ActiveView::Hidden => self.hidden_rows(),
            ActiveView::Logs => Vec::new(),
        }
    }

    pub fn select(&mut self, id: u64) -> bool {
        match self.row(id).cloned() {
            Some(row) => {
                self.selection = Some(row);
                true
            }
            None => false,
        }
    }

    /// Selection pushed by the host outside any request.
    pub fn apply_selection_push(&mut self, row: Row) {
        self.selection = Some(row);
    }

    /// Optimistic flag edit, pending the next snapshot.
    pub fn apply_flag_delta(&mut self, id: u64, delta: &FlagDelta) -> bool {
        let Some(row) = self.rows.iter_mut().find(|row| row.id == id) else {
            return false;
        };
        delta.apply_to(&mut row.flags);
        if let Some(selected) = self.selection.as_mut().filter(|row| row.id == id) {
            delta.apply_to(&mut selected.flags);
        }
        true
    }

    /// Optimistic whole-row patch (e.g. a `quick_apply` result).
    pub fn patch_row(&mut self, updated: Row) -> bool {
        if let Some(selected) = self.selection.as_mut().filter(|row| row.id == updated.id) {
            *selected = updated.clone();
        }
        match self.rows.iter_mut().find(|row| row.id == updated.id) {
            Some(row) => {
                *row = updated;
                true
            }
            None => false,
        }
    }

    pub fn fingerprint(&self) -> ViewFingerprint {
        ViewFingerprint {
            active_view: self.active_view,
            entity_count: self.rows.len(),
            kind_count: self.kinds.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_proto::{FlagKey, Flags};

    fn row(id: u64, kind: Option<&str>, flags: Flags) -> Row {
        Row {
            flags,
            ..Row::new(id, format!("M-{id}"), kind)
        }
    }

    fn snapshot(entries: Vec<Row>, kinds: &[(&str, &str)]) -> Snapshot {
        Snapshot {
            entries,
            kinds: kinds
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            logs: Vec::new(),
        }
    }

    fn ids(rows: Vec<&Row>) -> Vec<u64> {
        rows.into_iter().map(|row| row.id).collect()
    }

    #[test]
    fn unclassified_sample_is_hidden_not_sampled() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(
            vec![
                row(1, Some(""), Flags { sample: true, ..Flags::default() }),
                row(2, Some("wood"), Flags { sample: true, ..Flags::default() }),
                row(3, Some("wood"), Flags { hidden: true, sample: true, ..Flags::default() }),
                row(4, None, Flags::default()),
                row(5, Some("metal"), Flags::default()),
            ],
            &[("wood", "Wood"), ("metal", "Metal")],
        ));

        assert_eq!(ids(store.hidden_rows()), vec![1, 3, 4]);
        assert_eq!(ids(store.visible_rows()), vec![2, 5]);
        assert_eq!(ids(store.sample_rows()), vec![2]);
        assert!(store.rows_for(ActiveView::Logs).is_empty());
    }

    #[test]
    fn views_partition_rows() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(
            vec![
                row(1, Some("a"), Flags::default()),
                row(2, None, Flags { hidden: true, ..Flags::default() }),
                row(3, Some("a"), Flags { hidden: true, ..Flags::default() }),
                row(4, Some(""), Flags::default()),
            ],
            &[("a", "A")],
        ));
        let visible = store.visible_rows().len();
        let hidden = store.hidden_rows().len();
        assert_eq!(visible + hidden, store.rows().len());
        for sample in store.sample_rows() {
            assert!(store.visible_rows().iter().any(|row| row.id == sample.id));
        }
    }

    #[test]
    fn snapshot_replaces_rather_than_merges() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(
            vec![row(1, Some("a"), Flags::default()), row(2, Some("a"), Flags::default())],
            &[("a", "A"), ("b", "B")],
        ));
        let next = snapshot(vec![row(3, Some("c"), Flags::default())], &[("c", "C")]);
        store.replace_snapshot(next.clone());
        assert_eq!(store.rows(), next.entries.as_slice());
        assert_eq!(store.kinds(), &next.kinds);
    }

    #[test]
    fn selection_refreshes_from_new_snapshot() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(vec![row(7, Some("a"), Flags::default())], &[]));
        assert!(store.select(7));

        let mut fresh = row(7, Some("b"), Flags { locked: true, ..Flags::default() });
        fresh.notes = "re-coded".into();
        store.replace_snapshot(snapshot(vec![fresh.clone()], &[]));
        assert_eq!(store.selection(), Some(&fresh));
    }

    #[test]
    fn vanished_selection_is_left_untouched() {
        let mut store = StateStore::new();
        let original = row(7, Some("a"), Flags::default());
        store.replace_snapshot(snapshot(vec![original.clone()], &[]));
        store.select(7);
        store.replace_snapshot(snapshot(vec![row(8, Some("a"), Flags::default())], &[]));
        assert_eq!(store.selection(), Some(&original));
    }

    #[test]
    fn optimistic_flag_edit_touches_row_and_selection() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(vec![row(1, Some("a"), Flags::default())], &[]));
        store.select(1);
        assert!(store.apply_flag_delta(1, &FlagDelta::with(FlagKey::Hidden, true)));
        assert!(store.row(1).expect("row").flags.hidden);
        assert!(store.selection().expect("selection").flags.hidden);
        assert!(!store.apply_flag_delta(99, &FlagDelta::with(FlagKey::Hidden, true)));

        store.replace_snapshot(snapshot(vec![row(1, Some("a"), Flags::default())], &[]));
        assert!(!store.row(1).expect("row").flags.hidden);
    }

    #[test]
    fn patch_row_updates_matching_selection() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(vec![row(1, Some("a"), Flags::default())], &[]));
        store.select(1);
        let mut updated = row(1, Some("a"), Flags::default());
        updated.code = "PFX-001".into();
        assert!(store.patch_row(updated.clone()));
        assert_eq!(store.row(1), Some(&updated));
        assert_eq!(store.selection(), Some(&updated));
    }

    #[test]
    fn fingerprint_tracks_view_and_counts() {
        let mut store = StateStore::new();
        let before = store.fingerprint();
        store.replace_snapshot(snapshot(vec![row(1, Some("a"), Flags::default())], &[("a", "A")]));
        let after = store.fingerprint();
        assert_ne!(before, after);
        assert_eq!(after.entity_count, 1);
        assert_eq!(after.kind_count, 1);
        store.set_active_view(ActiveView::Hidden);
        assert_eq!(store.fingerprint().active_view, ActiveView::Hidden);
    }

    #[test]
    fn kind_label_resolves_through_dictionary() {
        let mut store = StateStore::new();
        store.replace_snapshot(snapshot(vec![row(1, Some("wd"), Flags::default())], &[("wd", "Wood")]));
        let row = store.row(1).expect("row").clone();
        assert_eq!(store.kind_label(&row), Some("Wood"));
    }
}
