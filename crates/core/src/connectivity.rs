//! Connectivity monitor: debounced Offline/Online state machine.
//!
//! Raw link observations come from a swappable [`ConnectivityProbe`] (or are
//! reported directly by the host platform). A transition to Online is only
//! published after the link has stayed up for the debounce window, so flaky
//! connections do not trigger repeated drain attempts. Offline transitions
//! publish immediately.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Stability window before an Online transition is reported.
pub const DEFAULT_ONLINE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Process-wide connectivity state, owned by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub online: bool,
}

/// Swappable transport-availability check.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

#[derive(Debug, Default)]
struct RawLink {
    up: bool,
    /// Bumped on every raw transition; stale debounce timers check it and
    /// drop out instead of publishing.
    generation: u64,
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    state_tx: watch::Sender<ConnectivityState>,
    raw: Mutex<RawLink>,
    debounce: Duration,
}

impl ConnectivityMonitor {
    pub fn new(debounce: Duration) -> Self {
        let (state_tx, _state_rx) = watch::channel(ConnectivityState::default());
        Self {
            state_tx,
            raw: Mutex::new(RawLink::default()),
            debounce,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state_tx.borrow().online
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    fn lock_raw(&self) -> std::sync::MutexGuard<'_, RawLink> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw link-up observation. Publishes Online only if the link is still up
    /// after the debounce window.
    pub fn report_link_up(self: &Arc<Self>) {
        let generation = {
            let mut raw = self.lock_raw();
            if raw.up {
                return;
            }
            raw.up = true;
            raw.generation += 1;
            raw.generation
        };

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(monitor.debounce).await;
            monitor.confirm_online(generation);
        });
    }

    /// Raw link-down observation. Published immediately.
    pub fn report_link_down(&self) {
        {
            let mut raw = self.lock_raw();
            raw.up = false;
            raw.generation += 1;
        }
        let changed = self.state_tx.send_if_modified(|state| {
            if state.online {
                state.online = false;
                true
            } else {
                false
            }
        });
        if changed {
            log::info!("[Connectivity] Offline");
        }
    }

    fn confirm_online(&self, generation: u64) {
        {
            let raw = self.lock_raw();
            if !raw.up || raw.generation != generation {
                // Link flapped during the window.
                return;
            }
        }
        let changed = self.state_tx.send_if_modified(|state| {
            if state.online {
                false
            } else {
                state.online = true;
                true
            }
        });
        if changed {
            log::info!("[Connectivity] Online (stable for {:?})", self.debounce);
        }
    }

    /// Polls the probe at `interval` and feeds raw observations into the
    /// monitor. Returns the handle so the owner can stop the loop.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if probe.is_reachable().await {
                    monitor.report_link_up();
                } else {
                    monitor.report_link_down();
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_ONLINE_DEBOUNCE)
    }
}
