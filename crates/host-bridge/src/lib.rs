use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("host transport not attached")]
    TransportUnavailable,
    #[error("host handshake not exposed")]
    HandshakeUnavailable,
    #[error("host transport error: {0}")]
    Transport(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Surface a host exposes to the embedded panel.
///
/// Every capability may be missing at any moment: hosts inject the bridge
/// late, and some never expose the handshake pair at all. Callers check
/// `has_transport` / `has_handshake` before use instead of assuming presence.
pub trait HostBridge: Send + Sync {
    fn has_transport(&self) -> bool;
    fn has_handshake(&self) -> bool;

    /// Hand one serialized `{name, args}` message to the host. Never waits for a result.
    fn call(&self, message: &str) -> BridgeResult<()>;

    fn ready(&self) -> BridgeResult<()>;
    fn ping(&self, message: &str) -> BridgeResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Call(String),
    Ready,
    Ping(String),
}

/// In-memory bridge for tests and headless runs. Records every delivered
/// message and lets callers toggle capabilities to mimic late injection.
#[derive(Debug, Default)]
pub struct LocalBridge {
    transport: AtomicBool,
    handshake: AtomicBool,
    failing_transport: AtomicBool,
    failing_ping: AtomicBool,
    events: Mutex<Vec<BridgeEvent>>,
}

impl LocalBridge {
    /// Fully attached bridge: transport and handshake both reachable.
    pub fn new() -> Self {
        let bridge = Self::default();
        bridge.transport.store(true, Ordering::Release);
        bridge.handshake.store(true, Ordering::Release);
        bridge
    }

    /// Handshake exposed but transport not injected yet.
    pub fn detached() -> Self {
        let bridge = Self::default();
        bridge.handshake.store(true, Ordering::Release);
        bridge
    }

    /// No capabilities at all, as seen when the panel runs outside a host.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn attach(&self) {
        self.transport.store(true, Ordering::Release);
    }

    pub fn detach(&self) {
        self.transport.store(false, Ordering::Release);
    }

    pub fn fail_transport(&self, failing: bool) {
        self.failing_transport.store(failing, Ordering::Release);
    }

    pub fn fail_ping(&self, failing: bool) {
        self.failing_ping.store(failing, Ordering::Release);
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BridgeEvent::Call(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pings(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BridgeEvent::Ping(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, BridgeEvent::Ready))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl HostBridge for LocalBridge {
    fn has_transport(&self) -> bool {
        self.transport.load(Ordering::Acquire)
    }

    fn has_handshake(&self) -> bool {
        self.handshake.load(Ordering::Acquire)
    }

    fn call(&self, message: &str) -> BridgeResult<()> {
        if !self.has_transport() {
            return Err(BridgeError::TransportUnavailable);
        }
        if self.failing_transport.load(Ordering::Acquire) {
            return Err(BridgeError::Transport("simulated transport failure".into()));
        }
        self.events.lock().push(BridgeEvent::Call(message.to_string()));
        Ok(())
    }

    fn ready(&self) -> BridgeResult<()> {
        if !self.has_handshake() {
            return Err(BridgeError::HandshakeUnavailable);
        }
        self.events.lock().push(BridgeEvent::Ready);
        Ok(())
    }

    fn ping(&self, message: &str) -> BridgeResult<()> {
        if !self.has_handshake() {
            return Err(BridgeError::HandshakeUnavailable);
        }
        if self.failing_ping.load(Ordering::Acquire) {
            return Err(BridgeError::Transport("simulated ping failure".into()));
        }
        self.events.lock().push(BridgeEvent::Ping(message.to_string()));
        Ok(())
    }
}
