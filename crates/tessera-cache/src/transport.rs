//! Cluster transport for invalidation messages.
//!
//! Only invalidations travel between nodes. Each node stamps outgoing messages
//! with its name, an epoch drawn when its container starts, and a sequence
//! within that epoch so receivers can discard duplicates. A node restarted
//! under the same name gets a new epoch. Delivery guarantees beyond
//! per-origin order belong to the transport.

use crate::topology::{CacheName, Synchronicity};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tessera_core::RealmId;
use tracing::{debug, info};
use uuid::Uuid;

/// What a peer should discard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationKind {
    /// A single entry by entity id.
    Entity { id: String },
    /// Every entry scoped to a realm.
    Realm { realm_id: RealmId },
    /// The whole cache.
    Clear,
}

/// An invalidation sent from one node to its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// Target cache.
    pub cache: CacheName,
    /// Sending node.
    pub origin: String,
    /// Incarnation of the sending container.
    pub epoch: Uuid,
    /// Sequence within the epoch, strictly increasing.
    pub sequence: u64,
    /// Whether the sender waits for delivery.
    pub synchronicity: Synchronicity,
    /// What to discard.
    pub kind: InvalidationKind,
}

/// Receives invalidations from peers.
pub trait InvalidationListener: Send + Sync {
    /// Applies a peer's invalidation to local state.
    fn on_invalidation(&self, message: &InvalidationMessage);

    /// Called when a peer leaves the cluster.
    fn on_member_left(&self, _node_name: &str) {}
}

/// Sends invalidations to peers.
///
/// Implementations must deliver messages from one origin in the order they
/// were broadcast.
pub trait InvalidationTransport: Send + Sync {
    /// Name of the local node.
    fn node_name(&self) -> &str;

    /// Sends a message to every other member.
    fn broadcast(&self, message: &InvalidationMessage);

    /// Registers the local receiver. The transport holds it weakly.
    fn register(&self, listener: Weak<dyn InvalidationListener>);

    /// Names of the current members, including the local node.
    fn members(&self) -> Vec<String>;
}

struct Member {
    id: u64,
    node_name: String,
    listener: Option<Weak<dyn InvalidationListener>>,
}

/// In-process cluster connecting several containers in one address space.
///
/// Delivery is synchronous: `broadcast` returns after every live member has
/// applied the message, which satisfies both synchronicities.
#[derive(Default)]
pub struct ClusterBus {
    members: RwLock<Vec<Member>>,
    next_member_id: AtomicU64,
    delivered: AtomicU64,
}

impl ClusterBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Joins the bus as a new member.
    #[must_use]
    pub fn join(self: &Arc<Self>, node_name: impl Into<String>) -> Arc<BusTransport> {
        let node_name = node_name.into();
        let id = self.next_member_id.fetch_add(1, Ordering::Relaxed);
        self.members.write().push(Member {
            id,
            node_name: node_name.clone(),
            listener: None,
        });
        info!(node = %node_name, "Node joined cluster bus");
        Arc::new(BusTransport {
            bus: Arc::clone(self),
            id,
            node_name,
        })
    }

    /// Total number of messages applied by members.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn register(&self, id: u64, listener: Weak<dyn InvalidationListener>) {
        let mut members = self.members.write();
        if let Some(member) = members.iter_mut().find(|m| m.id == id) {
            member.listener = Some(listener);
        }
    }

    // Members are matched by id so a restarted node may reuse its name.
    fn leave(&self, id: u64, node_name: &str) {
        let remaining: Vec<Arc<dyn InvalidationListener>> = {
            let mut members = self.members.write();
            members.retain(|m| m.id != id);
            members
                .iter()
                .filter_map(|m| m.listener.as_ref().and_then(Weak::upgrade))
                .collect()
        };
        info!(node = %node_name, "Node left cluster bus");
        for listener in remaining {
            listener.on_member_left(node_name);
        }
    }

    fn deliver(&self, message: &InvalidationMessage) {
        // Snapshot the receivers so listeners run without the member lock held.
        let receivers: Vec<Arc<dyn InvalidationListener>> = self
            .members
            .read()
            .iter()
            .filter(|m| m.node_name != message.origin)
            .filter_map(|m| m.listener.as_ref().and_then(Weak::upgrade))
            .collect();

        for receiver in receivers {
            receiver.on_invalidation(message);
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn member_names(&self) -> Vec<String> {
        self.members
            .read()
            .iter()
            .map(|m| m.node_name.clone())
            .collect()
    }
}

/// One node's handle on a [`ClusterBus`].
pub struct BusTransport {
    bus: Arc<ClusterBus>,
    id: u64,
    node_name: String,
}

impl InvalidationTransport for BusTransport {
    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn broadcast(&self, message: &InvalidationMessage) {
        debug!(
            cache = %message.cache,
            origin = %message.origin,
            sequence = message.sequence,
            "Broadcasting invalidation"
        );
        self.bus.deliver(message);
    }

    fn register(&self, listener: Weak<dyn InvalidationListener>) {
        self.bus.register(self.id, listener);
    }

    fn members(&self) -> Vec<String> {
        self.bus.member_names()
    }
}

impl Drop for BusTransport {
    fn drop(&mut self) {
        self.bus.leave(self.id, &self.node_name);
    }
}
