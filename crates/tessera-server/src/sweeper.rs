//! Periodic removal of expired sessions.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{current_time, RealmId, SessionLimits, TesseraError, TesseraResult};
use tessera_sessions::{ExpiredSessions, UserSessionStore};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Runs [`UserSessionStore::remove_expired`] for every watched realm on a
/// fixed interval.
pub struct SessionSweeper {
    store: Arc<dyn UserSessionStore>,
    interval: Duration,
    realms: RwLock<BTreeMap<RealmId, SessionLimits>>,
    shutdown_tx: watch::Sender<bool>,
    running: AtomicBool,
    sweeps: AtomicU64,
    removed: AtomicU64,
}

impl SessionSweeper {
    #[must_use]
    pub fn new(store: Arc<dyn UserSessionStore>, interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            interval,
            realms: RwLock::new(BTreeMap::new()),
            shutdown_tx,
            running: AtomicBool::new(false),
            sweeps: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// Sweeps `realm_id` with `limits` from the next run on. Replaces the
    /// limits of a realm already watched.
    pub fn watch_realm(&self, realm_id: RealmId, limits: SessionLimits) {
        debug!(realm_id = %realm_id, "Watching realm for expired sessions");
        self.realms.write().insert(realm_id, limits);
    }

    /// Stops sweeping a realm, typically after it was removed.
    pub fn unwatch_realm(&self, realm_id: &RealmId) -> bool {
        self.realms.write().remove(realm_id).is_some()
    }

    #[must_use]
    pub fn watched_realms(&self) -> Vec<RealmId> {
        self.realms.read().keys().cloned().collect()
    }

    /// Sweeps every watched realm once as of `now`.
    pub fn sweep_once(&self, now: i64) -> ExpiredSessions {
        let realms: Vec<(RealmId, SessionLimits)> = self
            .realms
            .read()
            .iter()
            .map(|(realm_id, limits)| (realm_id.clone(), *limits))
            .collect();

        let mut total = ExpiredSessions::default();
        for (realm_id, limits) in &realms {
            total += self.store.remove_expired(realm_id, limits, now);
        }

        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.removed.fetch_add(total.total() as u64, Ordering::Relaxed);
        if total.total() > 0 {
            info!(
                realms = realms.len(),
                user_sessions = total.user_sessions,
                offline_user_sessions = total.offline_user_sessions,
                initial_access = total.initial_access,
                "Expired sessions removed"
            );
        }
        total
    }

    /// Runs until [`stop`](Self::stop) is called. The first sweep happens
    /// immediately.
    pub async fn run(&self) -> TesseraResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TesseraError::conflict("Session sweeper already running"));
        }

        info!(interval_secs = self.interval.as_secs(), "Starting session sweeper");
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown_rx.borrow() {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once(current_time());
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            sweeps = self.sweeps(),
            removed = self.removed(),
            "Session sweeper stopped"
        );
        Ok(())
    }

    /// Asks a running sweeper to stop. A sweeper started afterwards exits
    /// immediately.
    pub fn stop(&self) {
        info!("Stopping session sweeper...");
        self.shutdown_tx.send_replace(true);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of completed sweeps.
    #[must_use]
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Number of entries removed across all sweeps.
    #[must_use]
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }
}
