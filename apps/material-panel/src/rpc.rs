//! One-way call/response channel to the host.
//!
//! Responses carry only the method name, so two in-flight calls to the same
//! method cannot be told apart: whichever resolution arrives is handed to the
//! handler for that name. Callers go through [`RpcChannel`] only, keeping the
//! correlation scheme swappable.

use std::sync::Arc;

use host_bridge::HostBridge;
use panel_proto::{Method, OutboundMessage, RejectPayload, ResolvePayload};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PanelError, PanelResult};
use crate::ui::PanelUi;

/// Fixed per-method table invoked by [`RpcChannel::dispatch`].
pub trait ResponseHandler {
    fn on_result(&self, method: Method, result: Value) -> PanelResult<()>;
    fn on_error(&self, name: &str, error: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Resolve(ResolvePayload),
    Reject(RejectPayload),
}

pub struct RpcChannel {
    bridge: Arc<dyn HostBridge>,
    ui: Arc<dyn PanelUi>,
}

impl RpcChannel {
    pub fn new(bridge: Arc<dyn HostBridge>, ui: Arc<dyn PanelUi>) -> Self {
        Self { bridge, ui }
    }

    pub fn encode<A: Serialize + ?Sized>(method: Method, args: &A) -> PanelResult<String> {
        let args = serde_json::to_value(args)
            .map_err(|source| PanelError::Encode { method, source })?;
        let message = OutboundMessage {
            name: method.as_str().to_string(),
            args,
        };
        serde_json::to_string(&message).map_err(|source| PanelError::Encode { method, source })
    }

    /// Fire-and-forget. Without a transport the call is dropped and only a
    /// status message is left behind; nothing is queued for later delivery.
    pub fn call<A: Serialize + ?Sized>(&self, method: Method, args: &A) {
        if !self.bridge.has_transport() {
            debug!(target: "panel.rpc", method = %method, "host transport missing; call dropped");
            self.ui
                .status(&format!("Host bridge unavailable; {method} was not sent"));
            return;
        }

        let message = match Self::encode(method, args) {
            Ok(message) => message,
            Err(err) => {
                warn!(target: "panel.rpc", method = %method, error = %err, "failed to encode call");
                self.ui.status(&format!("Could not send {method}: {err}"));
                return;
            }
        };

        match self.bridge.call(&message) {
            Ok(()) => debug!(target: "panel.rpc", method = %method, "call sent"),
            Err(err) => {
                warn!(target: "panel.rpc", method = %method, error = %err, "host transport rejected call");
                self.ui.status(&format!("Could not send {method}: {err}"));
            }
        }
    }

    pub fn dispatch(&self, inbound: Inbound, handler: &dyn ResponseHandler) -> PanelResult<()> {
        match inbound {
            Inbound::Resolve(payload) => self.on_resolve(payload, handler),
            Inbound::Reject(payload) => {
                self.on_reject(payload, handler);
                Ok(())
            }
        }
    }

    pub fn on_resolve(
        &self,
        payload: ResolvePayload,
        handler: &dyn ResponseHandler,
    ) -> PanelResult<()> {
        let method = match payload.name.parse::<Method>() {
            Ok(method) => method,
            Err(err) => {
                debug!(target: "panel.rpc", error = %err, "ignoring resolution for unknown method");
                return Ok(());
            }
        };
        debug!(target: "panel.rpc", method = %method, "host resolved");
        handler.on_result(method, payload.result)
    }

    pub fn on_reject(&self, payload: RejectPayload, handler: &dyn ResponseHandler) {
        warn!(
            target: "panel.rpc",
            method = %payload.name,
            error = %payload.error,
            "host rejected call"
        );
        handler.on_error(&payload.name, &payload.error);
    }
}
