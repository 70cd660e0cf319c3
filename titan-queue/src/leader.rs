//! Leader election.
//!
//! A named lease with a TTL held in a shared store, refreshed at half the
//! TTL. Leadership is monotonic per lease epoch: a holder that fails to
//! refresh drops out before any other instance can acquire the next
//! epoch, so exactly one instance runs a singleton workload at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared lease storage.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Acquire the named lease if free or expired. Returns the new epoch.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Option<u64>;

    /// Extend the lease; fails when the holder or epoch no longer match.
    async fn refresh(&self, name: &str, holder: &str, epoch: u64, ttl: Duration) -> bool;

    /// Release the lease if still held at this epoch.
    async fn release(&self, name: &str, holder: &str, epoch: u64);
}

struct Lease {
    holder: String,
    epoch: u64,
    expires_at: Instant,
}

/// Single-process lease store; the distributed deployments swap in a
/// shared backend behind the same trait.
#[derive(Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Option<u64> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        match leases.get_mut(name) {
            Some(lease) if lease.expires_at > now && lease.holder != holder => None,
            Some(lease) => {
                lease.epoch += 1;
                lease.holder = holder.to_string();
                lease.expires_at = now + ttl;
                Some(lease.epoch)
            }
            None => {
                leases.insert(
                    name.to_string(),
                    Lease {
                        holder: holder.to_string(),
                        epoch: 1,
                        expires_at: now + ttl,
                    },
                );
                Some(1)
            }
        }
    }

    async fn refresh(&self, name: &str, holder: &str, epoch: u64, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        match leases.get_mut(name) {
            Some(lease)
                if lease.holder == holder && lease.epoch == epoch && lease.expires_at > now =>
            {
                lease.expires_at = now + ttl;
                true
            }
            _ => false,
        }
    }

    async fn release(&self, name: &str, holder: &str, epoch: u64) {
        let mut leases = self.leases.lock();
        if let Some(lease) = leases.get(name) {
            if lease.holder == holder && lease.epoch == epoch {
                leases.remove(name);
            }
        }
    }
}

/// Holds (or keeps trying to take) one named lease.
pub struct LeaderElection {
    store: Arc<dyn LeaseStore>,
    name: String,
    holder_id: String,
    ttl: Duration,
    is_leader: AtomicBool,
    epoch: Mutex<Option<u64>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LeaderElection {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        name: impl Into<String>,
        holder_id: impl Into<String>,
        ttl: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            name: name.into(),
            holder_id: holder_id.into(),
            ttl,
            is_leader: AtomicBool::new(false),
            epoch: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            join_handle: Mutex::new(None),
        })
    }

    /// Whether this instance currently holds the lease.
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Start the acquire/refresh loop (refresh at half the TTL).
    pub fn start(self: &Arc<Self>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);
        let election = Arc::clone(self);

        let join_handle = tokio::spawn(async move {
            let refresh_interval = election.ttl / 2;
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let held_epoch = *election.epoch.lock();
                match held_epoch {
                    Some(epoch) => {
                        let renewed = election
                            .store
                            .refresh(&election.name, &election.holder_id, epoch, election.ttl)
                            .await;
                        if !renewed {
                            // stop processing before anyone else can lead
                            election.is_leader.store(false, Ordering::SeqCst);
                            *election.epoch.lock() = None;
                            warn!(lease = %election.name, holder = %election.holder_id,
                                  "lost leader lease");
                        }
                    }
                    None => {
                        if let Some(epoch) = election
                            .store
                            .try_acquire(&election.name, &election.holder_id, election.ttl)
                            .await
                        {
                            *election.epoch.lock() = Some(epoch);
                            election.is_leader.store(true, Ordering::SeqCst);
                            info!(lease = %election.name, holder = %election.holder_id, epoch,
                                  "acquired leader lease");
                        } else {
                            debug!(lease = %election.name, "lease held elsewhere; standing by");
                        }
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(refresh_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }

            // drop leadership on the way out
            election.is_leader.store(false, Ordering::SeqCst);
            let released_epoch = election.epoch.lock().take();
            if let Some(epoch) = released_epoch {
                election
                    .store
                    .release(&election.name, &election.holder_id, epoch)
                    .await;
            }
        });

        *self.join_handle.lock() = Some(join_handle);
    }

    /// Stop refreshing and release the lease.
    pub async fn stop(&self) {
        let sender = self.shutdown_tx.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
        let handle = self.join_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_holder_at_a_time() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
        let ttl = Duration::from_millis(200);

        let first = store.try_acquire("sync", "a", ttl).await;
        assert_eq!(first, Some(1));
        assert!(store.try_acquire("sync", "b", ttl).await.is_none());

        // expired lease can be taken at a higher epoch
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.try_acquire("sync", "b", ttl).await, Some(2));
    }

    #[tokio::test]
    async fn refresh_requires_matching_epoch() {
        let store = MemoryLeaseStore::new();
        let ttl = Duration::from_millis(200);
        let epoch = store.try_acquire("sync", "a", ttl).await.unwrap();

        assert!(store.refresh("sync", "a", epoch, ttl).await);
        assert!(!store.refresh("sync", "a", epoch + 1, ttl).await);
        assert!(!store.refresh("sync", "b", epoch, ttl).await);
    }

    #[tokio::test]
    async fn election_acquires_and_releases() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
        let election = LeaderElection::new(
            store.clone(),
            "scheduler",
            "node-1",
            Duration::from_millis(100),
        );
        election.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(election.is_leader());

        election.stop().await;
        assert!(!election.is_leader());
        // lease is free again
        assert!(store
            .try_acquire("scheduler", "node-2", Duration::from_millis(100))
            .await
            .is_some());
    }
}
