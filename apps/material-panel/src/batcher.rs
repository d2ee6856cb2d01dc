//! Coalesces rapid per-row flag edits into one `set_flags` call per row.
//!
//! A single shared timer governs the whole queue. It is armed by the first
//! edit after a flush and is never pushed back by later edits, so everything
//! queued before it fires goes out together.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use panel_proto::{FlagDelta, FlagKey, Method, SetFlagsArgs};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::rpc::RpcChannel;

#[derive(Default)]
struct BatchState {
    pending: BTreeMap<u64, FlagDelta>,
    timer: Option<JoinHandle<()>>,
    epoch: u64,
}

impl BatchState {
    fn take(&mut self) -> BTreeMap<u64, FlagDelta> {
        self.epoch = self.epoch.wrapping_add(1);
        self.timer = None;
        mem::take(&mut self.pending)
    }
}

pub struct MutationBatcher {
    rpc: Arc<RpcChannel>,
    window: Duration,
    state: Mutex<BatchState>,
}

impl MutationBatcher {
    pub fn new(rpc: Arc<RpcChannel>, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            rpc,
            window,
            state: Mutex::new(BatchState::default()),
        })
    }

    pub fn enqueue(self: &Arc<Self>, id: u64, key: FlagKey, value: bool) {
        let mut state = self.state.lock();
        state.pending.entry(id).or_default().set(key, value);
        debug!(target: "panel.batcher", id, flag = %key, value, "flag edit queued");

        if state.timer.is_some() {
            return;
        }
        let epoch = state.epoch;
        let batcher = Arc::clone(self);
        let window = self.window;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            batcher.flush_armed(epoch);
        }));
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn pending_delta(&self, id: u64) -> Option<FlagDelta> {
        self.state.lock().pending.get(&id).copied()
    }

    /// Flush immediately, cancelling the armed timer.
    pub fn flush_now(&self) {
        let pending = {
            let mut state = self.state.lock();
            if let Some(handle) = state.timer.take() {
                handle.abort();
            }
            state.take()
        };
        self.send(pending);
    }

    fn flush_armed(&self, epoch: u64) {
        let pending = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return;
            }
            state.take()
        };
        self.send(pending);
    }

    fn send(&self, pending: BTreeMap<u64, FlagDelta>) {
        if pending.is_empty() {
            return;
        }
        debug!(target: "panel.batcher", rows = pending.len(), "flushing flag edits");
        // One call per row; a failed send for one id does not hold back the rest.
        for (id, flags) in pending {
            self.rpc.call(
                Method::SetFlags,
                &SetFlagsArgs {
                    ids: vec![id],
                    flags,
                },
            );
        }
    }
}
