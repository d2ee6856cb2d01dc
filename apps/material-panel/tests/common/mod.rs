#![allow(dead_code)]

use std::sync::Arc;

use host_bridge::LocalBridge;
use material_panel::config::PanelConfig;
use material_panel::session::PanelSession;
use material_panel::ui::RecordingUi;
use panel_proto::{Flags, Row};
use serde_json::{Value, json};

pub struct Panel {
    pub bridge: Arc<LocalBridge>,
    pub ui: Arc<RecordingUi>,
    pub session: PanelSession,
}

pub fn panel(bridge: LocalBridge) -> Panel {
    let bridge = Arc::new(bridge);
    let ui = Arc::new(RecordingUi::new());
    let session = PanelSession::new(&PanelConfig::default(), bridge.clone(), ui.clone());
    Panel {
        bridge,
        ui,
        session,
    }
}

pub fn sent(bridge: &LocalBridge) -> Vec<Value> {
    bridge
        .calls()
        .iter()
        .map(|raw| serde_json::from_str(raw).expect("outbound json"))
        .collect()
}

pub fn sent_names(bridge: &LocalBridge) -> Vec<String> {
    sent(bridge)
        .iter()
        .map(|call| call["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn row(id: u64, kind: &str) -> Row {
    Row::new(id, format!("MAT-{id:03}"), Some(kind))
}

pub fn flagged(id: u64, kind: &str, flags: Flags) -> Row {
    Row { flags, ..row(id, kind) }
}

pub fn snapshot(rows: &[Row], kinds: &[(&str, &str)]) -> Value {
    let kinds: serde_json::Map<String, Value> = kinds
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    json!({
        "entries": rows,
        "kinds": kinds,
        "logs": [{"timestamp": 1, "level": "info", "event": "sync", "data": {}}],
    })
}
