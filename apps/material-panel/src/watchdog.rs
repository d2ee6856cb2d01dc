//! Reconciliation loop closing the gap between the store and what is on screen.
//!
//! Every tick re-issues the handshake for hosts that inject their transport
//! late, and re-renders the active view only when the [`ViewFingerprint`]
//! moved. A tick never takes the loop down: faults and panics are forwarded
//! through [`DiagnosticForwarder`] and swallowed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use host_bridge::HostBridge;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::diagnostics::DiagnosticForwarder;
use crate::error::PanelResult;
use crate::store::{SharedStore, ViewFingerprint};
use crate::ui::PanelUi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Unchanged,
    Rendered,
    /// UI is backgrounded; the render step was skipped.
    Hidden,
    Faulted,
}

pub struct Watchdog {
    bridge: Arc<dyn HostBridge>,
    store: SharedStore,
    ui: Arc<dyn PanelUi>,
    diagnostics: DiagnosticForwarder,
    period: Duration,
    focus_debounce: Duration,
    last_rendered: Mutex<Option<ViewFingerprint>>,
    focus_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub fn new(
        bridge: Arc<dyn HostBridge>,
        store: SharedStore,
        ui: Arc<dyn PanelUi>,
        period: Duration,
        focus_debounce: Duration,
    ) -> Arc<Self> {
        let diagnostics = DiagnosticForwarder::new(bridge.clone());
        Arc::new(Self {
            bridge,
            store,
            ui,
            diagnostics,
            period,
            focus_debounce,
            last_rendered: Mutex::new(None),
            focus_timer: Mutex::new(None),
        })
    }

    pub fn diagnostics(&self) -> &DiagnosticForwarder {
        &self.diagnostics
    }

    pub fn last_fingerprint(&self) -> Option<ViewFingerprint> {
        *self.last_rendered.lock()
    }

    /// Tick on a fixed cadence until the returned task is aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watchdog.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                watchdog.tick();
            }
        })
    }

    /// Focus regained: tick once the debounce settles. Each call restarts it.
    pub fn notify_focus(self: &Arc<Self>) {
        let watchdog = Arc::clone(self);
        let debounce = self.focus_debounce;
        let mut timer = self.focus_timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            watchdog.focus_timer.lock().take();
            watchdog.tick();
        }));
    }

    pub fn stop_focus_timer(&self) {
        if let Some(timer) = self.focus_timer.lock().take() {
            timer.abort();
        }
    }

    pub fn tick(&self) -> TickOutcome {
        self.guarded("watchdog_tick", || self.tick_once())
            .unwrap_or(TickOutcome::Faulted)
    }

    /// Run `work` behind the fault boundary. Errors and panics are forwarded
    /// to the host as diagnostics under `source` and come back as `None`.
    pub fn guarded<T>(&self, source: &str, work: impl FnOnce() -> PanelResult<T>) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.diagnostics.forward_fault(source, &err);
                None
            }
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                self.diagnostics
                    .forward_fault(source, &format!("panic: {detail}"));
                None
            }
        }
    }

    fn tick_once(&self) -> PanelResult<TickOutcome> {
        if self.bridge.has_handshake() && !self.bridge.has_transport() {
            debug!(target: "panel.watchdog", "transport still missing; re-sending ready");
            self.bridge.ready()?;
        }

        if !self.ui.is_visible() {
            return Ok(TickOutcome::Hidden);
        }

        let store = self.store.lock();
        let fingerprint = store.fingerprint();
        if self.last_fingerprint() == Some(fingerprint) {
            trace!(target: "panel.watchdog", "fingerprint unchanged");
            return Ok(TickOutcome::Unchanged);
        }
        self.ui.render(fingerprint.active_view, &store)?;
        drop(store);

        *self.last_rendered.lock() = Some(fingerprint);
        debug!(
            target: "panel.watchdog",
            view = ?fingerprint.active_view,
            rows = fingerprint.entity_count,
            kinds = fingerprint.kind_count,
            "drift detected; view re-rendered"
        );
        Ok(TickOutcome::Rendered)
    }

    /// Render the active view now and remember what was drawn, so the next
    /// tick does not repeat the work. Skipped while the UI is hidden.
    pub fn render_active(&self) -> PanelResult<bool> {
        if !self.ui.is_visible() {
            return Ok(false);
        }
        let store = self.store.lock();
        let fingerprint = store.fingerprint();
        self.ui.render(fingerprint.active_view, &store)?;
        drop(store);
        *self.last_rendered.lock() = Some(fingerprint);
        Ok(true)
    }

    /// Faults raised outside a tick (e.g. an undecodable host result).
    pub fn report_fault(&self, source: &str, detail: &dyn std::fmt::Display) {
        self.diagnostics.forward_fault(source, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ActiveView, StateStore};
    use crate::ui::RecordingUi;
    use host_bridge::LocalBridge;
    use panel_proto::{Row, Snapshot};

    struct Harness {
        bridge: Arc<LocalBridge>,
        ui: Arc<RecordingUi>,
        store: SharedStore,
        watchdog: Arc<Watchdog>,
    }

    fn harness(bridge: LocalBridge) -> Harness {
        let bridge = Arc::new(bridge);
        let ui = Arc::new(RecordingUi::new());
        let store = StateStore::shared();
        let watchdog = Watchdog::new(
            bridge.clone(),
            store.clone(),
            ui.clone(),
            Duration::from_millis(900),
            Duration::from_millis(20),
        );
        Harness {
            bridge,
            ui,
            store,
            watchdog,
        }
    }

    fn load(store: &SharedStore, rows: u64, kinds: usize) {
        store.lock().replace_snapshot(Snapshot {
            entries: (1..=rows).map(|id| Row::new(id, format!("M{id}"), Some("k0"))).collect(),
            kinds: (0..kinds).map(|n| (format!("k{n}"), format!("Kind {n}"))).collect(),
            logs: Vec::new(),
        });
    }

    #[test]
    fn unchanged_fingerprint_skips_render() {
        let h = harness(LocalBridge::new());
        load(&h.store, 3, 1);

        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
        assert_eq!(h.watchdog.tick(), TickOutcome::Unchanged);
        assert_eq!(h.watchdog.tick(), TickOutcome::Unchanged);
        assert_eq!(h.ui.render_count(), 1);
    }

    #[test]
    fn kind_count_change_renders_exactly_once() {
        let h = harness(LocalBridge::new());
        load(&h.store, 3, 1);
        h.watchdog.tick();
        h.ui.clear();

        load(&h.store, 3, 2);
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
        assert_eq!(h.watchdog.tick(), TickOutcome::Unchanged);
        assert_eq!(h.ui.render_count(), 1);
    }

    #[test]
    fn view_switch_counts_as_drift() {
        let h = harness(LocalBridge::new());
        h.watchdog.tick();
        h.store.lock().set_active_view(ActiveView::Hidden);
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
        assert_eq!(
            h.watchdog.last_fingerprint().map(|fp| fp.active_view),
            Some(ActiveView::Hidden)
        );
    }

    #[test]
    fn render_active_records_fingerprint() {
        let h = harness(LocalBridge::new());
        load(&h.store, 2, 1);
        assert!(h.watchdog.render_active().expect("render"));
        assert_eq!(h.watchdog.tick(), TickOutcome::Unchanged);
        assert_eq!(h.ui.render_count(), 1);
    }

    #[test]
    fn late_bridge_gets_ready_until_transport_appears() {
        let h = harness(LocalBridge::detached());
        h.watchdog.tick();
        h.watchdog.tick();
        assert_eq!(h.bridge.ready_count(), 2);

        h.bridge.attach();
        h.watchdog.tick();
        assert_eq!(h.bridge.ready_count(), 2);
    }

    #[test]
    fn absent_bridge_is_left_alone() {
        let h = harness(LocalBridge::absent());
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
        assert!(h.bridge.events().is_empty());
    }

    #[test]
    fn render_error_is_pinged_and_retried_next_tick() {
        let h = harness(LocalBridge::new());
        h.ui.fail_render(true);
        assert_eq!(h.watchdog.tick(), TickOutcome::Faulted);
        assert_eq!(h.bridge.pings().len(), 1);
        assert_eq!(h.watchdog.last_fingerprint(), None);

        h.ui.fail_render(false);
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
    }

    #[test]
    fn panicking_render_does_not_escape_tick() {
        let h = harness(LocalBridge::new());
        h.ui.panic_render(true);
        assert_eq!(h.watchdog.tick(), TickOutcome::Faulted);
        assert!(h.bridge.pings()[0].contains("render exploded"));

        h.ui.panic_render(false);
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
    }

    #[test]
    fn hidden_ui_defers_render_until_visible() {
        let h = harness(LocalBridge::new());
        h.ui.set_visible(false);
        assert_eq!(h.watchdog.tick(), TickOutcome::Hidden);
        load(&h.store, 4, 1);
        assert_eq!(h.watchdog.tick(), TickOutcome::Hidden);
        assert_eq!(h.ui.render_count(), 0);

        h.ui.set_visible(true);
        assert_eq!(h.watchdog.tick(), TickOutcome::Rendered);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_loop_keeps_ticking_after_faults() {
        let h = harness(LocalBridge::new());
        h.ui.fail_render(true);
        let task = h.watchdog.spawn();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(h.bridge.pings().len(), 3, "ticks at 0, 900 and 1800ms");

        h.ui.fail_render(false);
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(h.ui.render_count(), 1);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn focus_bursts_collapse_into_one_tick() {
        let h = harness(LocalBridge::detached());
        h.watchdog.notify_focus();
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.watchdog.notify_focus();
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.watchdog.notify_focus();
        assert_eq!(h.bridge.ready_count(), 0);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(h.bridge.ready_count(), 1);
    }
}
