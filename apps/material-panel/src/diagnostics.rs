use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use host_bridge::HostBridge;
use serde_json::json;
use tracing::{debug, warn};

/// Best-effort fault reporting over the host's `ping` hook. Kept apart from
/// the RPC channel so it still works while calls are failing.
#[derive(Clone)]
pub struct DiagnosticForwarder {
    bridge: Arc<dyn HostBridge>,
}

impl DiagnosticForwarder {
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self { bridge }
    }

    pub fn announce(&self, message: &str) {
        self.ping(message);
    }

    pub fn forward_fault(&self, source: &str, detail: &dyn Display) {
        warn!(target: "panel.watchdog", source, error = %detail, "panel fault");
        let message = json!({
            "event": "panel_fault",
            "source": source,
            "detail": detail.to_string(),
        })
        .to_string();
        self.ping(&message);
    }

    fn ping(&self, message: &str) {
        if !self.bridge.has_handshake() {
            debug!(target: "panel.watchdog", "host ping unavailable; diagnostic dropped");
            return;
        }
        let bridge = &self.bridge;
        match panic::catch_unwind(AssertUnwindSafe(|| bridge.ping(message))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(target: "panel.watchdog", error = %err, "diagnostic ping failed")
            }
            Err(_) => debug!(target: "panel.watchdog", "diagnostic ping panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_bridge::LocalBridge;
    use serde_json::Value;

    #[test]
    fn faults_are_pinged_as_json() {
        let bridge = Arc::new(LocalBridge::new());
        let diagnostics = DiagnosticForwarder::new(bridge.clone());
        diagnostics.forward_fault("tick", &"render failed");

        let pinged: Value = serde_json::from_str(&bridge.pings()[0]).expect("json ping");
        assert_eq!(pinged["event"], "panel_fault");
        assert_eq!(pinged["source"], "tick");
        assert_eq!(pinged["detail"], "render failed");
    }

    #[test]
    fn missing_or_failing_ping_is_swallowed() {
        let absent = Arc::new(LocalBridge::absent());
        DiagnosticForwarder::new(absent.clone()).forward_fault("tick", &"x");
        assert!(absent.events().is_empty());

        let failing = Arc::new(LocalBridge::new());
        failing.fail_ping(true);
        DiagnosticForwarder::new(failing.clone()).announce("boot");
        assert!(failing.pings().is_empty());
    }
}
