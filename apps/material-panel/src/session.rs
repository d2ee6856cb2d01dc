use std::sync::Arc;

use host_bridge::HostBridge;
use panel_proto::{
    DeleteMaterialArgs, ExportCsvArgs, ExportCsvResult, FlagDelta, FlagKey, GenerateBoardsArgs,
    KindDictionary, KindsSaveArgs, Method, NoArgs, NormalizePreview, QuickApplyArgs,
    QuickApplyResult, RejectPayload, ResolvePayload, Row, Snapshot, SwapCodesArgs,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::batcher::MutationBatcher;
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::rpc::{Inbound, ResponseHandler, RpcChannel};
use crate::store::{ActiveView, RefreshScheduler, SharedStore, StateStore};
use crate::ui::{ConfirmPrompt, PanelUi};
use crate::watchdog::Watchdog;

pub const EXPORT_FILENAME: &str = "materials.csv";

/// A running panel: the components wired against one host bridge and one UI.
pub struct PanelSession {
    bridge: Arc<dyn HostBridge>,
    ui: Arc<dyn PanelUi>,
    store: SharedStore,
    rpc: Arc<RpcChannel>,
    batcher: Arc<MutationBatcher>,
    refresh: Arc<RefreshScheduler>,
    watchdog: Arc<Watchdog>,
    export_columns: Vec<String>,
}

impl PanelSession {
    pub fn new(config: &PanelConfig, bridge: Arc<dyn HostBridge>, ui: Arc<dyn PanelUi>) -> Self {
        let store = StateStore::shared();
        let rpc = Arc::new(RpcChannel::new(bridge.clone(), ui.clone()));
        let batcher = MutationBatcher::new(rpc.clone(), config.flush_window());
        let refresh = RefreshScheduler::new(rpc.clone(), config.refresh_delay());
        let watchdog = Watchdog::new(
            bridge.clone(),
            store.clone(),
            ui.clone(),
            config.watchdog_period(),
            config.focus_debounce(),
        );
        Self {
            bridge,
            ui,
            store,
            rpc,
            batcher,
            refresh,
            watchdog,
            export_columns: config.export_columns.clone(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn rpc(&self) -> &Arc<RpcChannel> {
        &self.rpc
    }

    pub fn batcher(&self) -> &Arc<MutationBatcher> {
        &self.batcher
    }

    pub fn refresh_scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.refresh
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Handshake, request the first snapshot and start the watchdog.
    pub fn start(&self) -> JoinHandle<()> {
        if self.bridge.has_handshake() {
            if let Err(err) = self.bridge.ready() {
                debug!(target: "panel.session", error = %err, "ready handshake failed");
            }
            self.watchdog.diagnostics().announce("material panel ready");
        }
        info!(
            target: "panel.session",
            transport = self.bridge.has_transport(),
            handshake = self.bridge.has_handshake(),
            "panel session starting"
        );
        self.rpc.call(Method::GetFull, &NoArgs {});
        self.watchdog.spawn()
    }

    /// Host injected its transport after startup.
    pub fn on_transport_attached(&self) {
        info!(target: "panel.session", "host transport attached");
        self.ui.status("Connected to host");
        self.refresh.force_full_refresh();
    }

    /// Flush queued edits and drop pending timers.
    pub fn shutdown(&self) {
        self.batcher.flush_now();
        self.refresh.cancel();
        self.watchdog.stop_focus_timer();
    }

    pub fn on_resolve(&self, payload: ResolvePayload) {
        self.dispatch(Inbound::Resolve(payload));
    }

    pub fn on_reject(&self, payload: RejectPayload) {
        self.dispatch(Inbound::Reject(payload));
    }

    pub fn dispatch(&self, inbound: Inbound) {
        if let Err(err) = self.rpc.dispatch(inbound, self) {
            self.watchdog.report_fault("dispatch", &err);
        }
    }

    /// Host-initiated selection change.
    pub fn on_selection(&self, row: Row) {
        debug!(target: "panel.session", id = row.id, "host pushed selection");
        self.store.lock().apply_selection_push(row);
        self.render();
    }

    pub fn on_focus(&self) {
        self.watchdog.notify_focus();
    }

    pub fn show_view(&self, view: ActiveView) {
        self.store.lock().set_active_view(view);
        self.render();
    }

    pub fn select(&self, id: u64) {
        if self.store.lock().select(id) {
            self.render();
        } else {
            debug!(target: "panel.session", id, "selection target not in store");
        }
    }

    /// Optimistically flip a flag locally and queue it for the host.
    pub fn set_flag(&self, id: u64, key: FlagKey, value: bool) {
        let known = self
            .store
            .lock()
            .apply_flag_delta(id, &FlagDelta::with(key, value));
        if !known {
            debug!(target: "panel.session", id, "flag edit for row missing locally");
        }
        self.batcher.enqueue(id, key, value);
        self.render();
    }

    pub fn quick_apply(&self, args: QuickApplyArgs) {
        self.rpc.call(Method::QuickApply, &args);
    }

    pub fn delete_material(&self, id: u64) {
        self.rpc.call(Method::DeleteMaterial, &DeleteMaterialArgs { id });
    }

    pub fn swap_codes(&self, a: u64, b: u64) {
        self.rpc.call(Method::SwapCodes, &SwapCodesArgs { a, b });
    }

    pub fn export_csv(&self, cols: Option<Vec<String>>) {
        let cols = cols.unwrap_or_else(|| self.export_columns.clone());
        self.rpc.call(Method::ExportCsv, &ExportCsvArgs { cols });
    }

    pub fn save_kinds(&self, kinds: KindDictionary) {
        self.rpc.call(Method::KindsSave, &KindsSaveArgs { kinds });
    }

    pub fn generate_boards(&self, ids: Vec<u64>) {
        self.rpc.call(Method::GenerateBoards, &GenerateBoardsArgs { ids });
    }

    /// Ask the host what normalizing codes would change; applying waits for
    /// the user to confirm the preview.
    pub fn request_normalize(&self) {
        self.rpc.call(Method::NormalizePreview, &NoArgs {});
    }

    pub fn refresh(&self) {
        self.refresh.force_full_refresh();
    }

    fn render(&self) {
        self.watchdog.guarded("render", || self.watchdog.render_active());
    }

    fn apply_snapshot(&self, snapshot: Snapshot) {
        self.store.lock().replace_snapshot(snapshot);
        self.render();
    }

    fn confirm_normalize(&self, preview: NormalizePreview) {
        if preview.changes.is_empty() {
            self.ui.status("All material codes are already normalized");
            return;
        }
        let prompt = ConfirmPrompt {
            title: "Normalize material codes?".into(),
            detail: format!("{} material code(s) will change.", preview.changes.len()),
        };
        if self.ui.confirm(&prompt) {
            self.rpc.call(Method::NormalizeAll, &NoArgs {});
        } else {
            debug!(target: "panel.session", "normalize declined");
        }
    }
}

fn decode<T: DeserializeOwned>(method: Method, result: Value) -> PanelResult<T> {
    serde_json::from_value(result).map_err(|source| PanelError::Decode { method, source })
}

impl ResponseHandler for PanelSession {
    fn on_result(&self, method: Method, result: Value) -> PanelResult<()> {
        match method {
            Method::GetFull => self.apply_snapshot(decode(method, result)?),
            Method::NormalizePreview => self.confirm_normalize(decode(method, result)?),
            Method::QuickApply => {
                let QuickApplyResult { updated } = decode(method, result)?;
                self.store.lock().patch_row(updated);
                self.render();
                self.refresh.schedule_full_refresh();
            }
            Method::SetFlags => self.refresh.schedule_full_refresh(),
            Method::KindsSave
            | Method::NormalizeAll
            | Method::DeleteMaterial
            | Method::SwapCodes
            | Method::GenerateBoards => self.refresh.force_full_refresh(),
            Method::ExportCsv => {
                let ExportCsvResult { csv } = decode(method, result)?;
                self.ui.download(EXPORT_FILENAME, &csv);
            }
        }
        Ok(())
    }

    fn on_error(&self, name: &str, error: &str) {
        warn!(target: "panel.session", method = name, error, "host call failed");
        self.ui.toast(&format!("{name} failed: {error}"));
    }
}
