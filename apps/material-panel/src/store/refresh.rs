use std::sync::Arc;
use std::time::Duration;

use panel_proto::{Method, NoArgs};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::rpc::RpcChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    ScheduledPending,
}

#[derive(Default)]
struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
    epoch: u64,
}

/// Debounces `get_full` requests after mutations.
pub struct RefreshScheduler {
    rpc: Arc<RpcChannel>,
    delay: Duration,
    timer: Mutex<RefreshTimer>,
}

impl RefreshScheduler {
    pub fn new(rpc: Arc<RpcChannel>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            rpc,
            delay,
            timer: Mutex::new(RefreshTimer::default()),
        })
    }

    pub fn state(&self) -> RefreshState {
        if self.timer.lock().handle.is_some() {
            RefreshState::ScheduledPending
        } else {
            RefreshState::Idle
        }
    }

    /// Arm a delayed `get_full`. No-op while one is already pending.
    pub fn schedule_full_refresh(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        if timer.handle.is_some() {
            debug!(target: "panel.refresh", "refresh already pending");
            return;
        }
        let epoch = timer.epoch;
        let scheduler = Arc::clone(self);
        let delay = self.delay;
        timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(epoch);
        }));
        debug!(target: "panel.refresh", delay_ms = delay.as_millis() as u64, "refresh scheduled");
    }

    /// Cancel any pending refresh and request `get_full` right away.
    pub fn force_full_refresh(&self) {
        self.cancel();
        self.rpc.call(Method::GetFull, &NoArgs {});
    }

    pub fn cancel(&self) {
        let mut timer = self.timer.lock();
        timer.epoch = timer.epoch.wrapping_add(1);
        if let Some(handle) = timer.handle.take() {
            handle.abort();
            debug!(target: "panel.refresh", "pending refresh cancelled");
        }
    }

    fn fire(&self, epoch: u64) {
        {
            let mut timer = self.timer.lock();
            if timer.epoch != epoch {
                return;
            }
            timer.epoch = timer.epoch.wrapping_add(1);
            timer.handle = None;
        }
        self.rpc.call(Method::GetFull, &NoArgs {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingUi;
    use host_bridge::LocalBridge;

    fn scheduler(bridge: &Arc<LocalBridge>) -> Arc<RefreshScheduler> {
        let rpc = Arc::new(RpcChannel::new(bridge.clone(), Arc::new(RecordingUi::new())));
        RefreshScheduler::new(rpc, Duration::from_millis(450))
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_schedules_issue_one_call() {
        let bridge = Arc::new(LocalBridge::new());
        let refresh = scheduler(&bridge);

        for _ in 0..5 {
            refresh.schedule_full_refresh();
        }
        assert_eq!(refresh.state(), RefreshState::ScheduledPending);

        tokio::time::sleep(Duration::from_millis(449)).await;
        assert!(bridge.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bridge.calls(), vec![r#"{"name":"get_full","args":{}}"#.to_string()]);
        assert_eq!(refresh.state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn force_cancels_pending_schedule() {
        let bridge = Arc::new(LocalBridge::new());
        let refresh = scheduler(&bridge);

        refresh.schedule_full_refresh();
        refresh.force_full_refresh();
        assert_eq!(refresh.state(), RefreshState::Idle);
        assert_eq!(bridge.calls().len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(bridge.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_rearms_after_firing() {
        let bridge = Arc::new(LocalBridge::new());
        let refresh = scheduler(&bridge);

        refresh.schedule_full_refresh();
        tokio::time::sleep(Duration::from_millis(500)).await;
        refresh.schedule_full_refresh();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(bridge.calls().len(), 2);
    }
}
