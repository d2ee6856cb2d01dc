//! Material panel: keeps an embedded management panel in sync with the host
//! application that owns the material catalog.
//!
//! Layers, leaf-first:
//! - [`rpc::RpcChannel`] hands `{name, args}` messages to the host and routes
//!   resolve/reject callbacks back by method name
//! - [`batcher::MutationBatcher`] coalesces rapid per-row flag edits
//! - [`store::StateStore`] mirrors the last host snapshot plus optimistic edits
//! - [`watchdog::Watchdog`] re-handshakes late bridges, re-renders on drift and
//!   forwards faults to the host
//!
//! [`session::PanelSession`] wires them together for a running panel.

pub mod batcher;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod error;
pub mod rpc;
pub mod session;
pub mod stdio;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod watchdog;

pub use error::{PanelError, PanelResult};
