//! Per-round exchange logic.
//!
//! Every peer-selection step spawns one task per message exchange and joins
//! all of them before the protocol moves on, so no node takes part in two
//! overlapping steps and a round is fully settled when `exchange` returns.

use std::sync::Arc;

use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinSet;
use tracing::trace;

use crate::abstractions::communication::LinkSender;
use crate::abstractions::process::NodePool;
use crate::abstractions::{Message, NodeId};
use crate::config::{ProtocolKind, ReplyVisibility};
use crate::error::Result;

pub mod gossip;
pub mod multicast;

pub use gossip::Gossip;
pub use multicast::Multicast;

pub enum DisseminationProtocol {
    Multicast(Multicast),
    Gossip(Gossip),
}

impl DisseminationProtocol {
    /// Seeds the pool according to `kind`. `rng` drives peer selection only.
    pub fn new(
        kind: ProtocolKind,
        pool: Arc<NodePool>,
        rng: ChaCha8Rng,
        reply_visibility: ReplyVisibility,
    ) -> Self {
        match kind {
            ProtocolKind::Multicast { group_size } => {
                DisseminationProtocol::Multicast(Multicast::new(pool, group_size))
            }
            ProtocolKind::Gossip(mode) => {
                DisseminationProtocol::Gossip(Gossip::new(pool, mode, rng, reply_visibility))
            }
        }
    }

    /// Runs one round. Returns `true` once every node is informed.
    pub async fn exchange(&mut self) -> Result<bool> {
        match self {
            DisseminationProtocol::Multicast(multicast) => multicast.exchange().await,
            DisseminationProtocol::Gossip(gossip) => gossip.exchange().await,
        }
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        match self {
            DisseminationProtocol::Multicast(multicast) => multicast.pool(),
            DisseminationProtocol::Gossip(gossip) => gossip.pool(),
        }
    }
}

/// Picks `k` distinct peers of `node` uniformly at random, never `node` itself.
///
/// # Panics
///
/// If `k` exceeds the number of other nodes.
pub(crate) fn sample_peers(
    rng: &mut ChaCha8Rng,
    node_count: usize,
    node: NodeId,
    k: usize,
) -> Vec<NodeId> {
    assert!(
        k < node_count,
        "cannot pick {k} peers out of {node_count} nodes"
    );
    // Sample over the other nodes and shift past `node`.
    index::sample(rng, node_count - 1, k)
        .into_iter()
        .map(|i| NodeId::new(if i >= node.index() { i + 1 } else { i }))
        .collect()
}

/// Sends a push from `sender` to every receiver and waits for all deliveries.
pub(crate) async fn push_to_all(
    pool: &Arc<NodePool>,
    sender: NodeId,
    receivers: Vec<NodeId>,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for receiver in receivers {
        let pool = Arc::clone(pool);
        tasks.spawn(async move {
            pool.send(sender, receiver, Message::Push);
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined?;
    }
    Ok(())
}

/// Sends a pull from `puller` to every peer and waits for all replies.
///
/// With [`ReplyVisibility::Immediate`] a delivered reply informs the puller
/// right away. With [`ReplyVisibility::Deferred`] the puller is left untouched
/// and the return value tells whether at least one reply got through.
pub(crate) async fn pull_from_all(
    pool: &Arc<NodePool>,
    puller: NodeId,
    peers: Vec<NodeId>,
    reply_visibility: ReplyVisibility,
) -> Result<bool> {
    let mut tasks = JoinSet::new();
    for peer in peers {
        let pool = Arc::clone(pool);
        tasks.spawn(async move {
            let Some(reply) = pool.send(puller, peer, Message::Pull) else {
                return false;
            };
            match reply_visibility {
                ReplyVisibility::Immediate => {
                    pool.send(peer, puller, reply);
                    false
                }
                ReplyVisibility::Deferred => {
                    let delivered = !pool.should_discard();
                    trace!(from = %peer, to = %puller, delivered, "reply staged");
                    delivered
                }
            }
        });
    }

    let mut staged = false;
    while let Some(joined) = tasks.join_next().await {
        staged |= joined?;
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;

    use super::*;

    #[test]
    fn sampled_peers_are_distinct_and_exclude_self() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for node in 0..6 {
            for k in 1..6 {
                let peers = sample_peers(&mut rng, 6, NodeId::new(node), k);
                let unique: BTreeSet<_> = peers.iter().copied().collect();
                assert_eq!(unique.len(), k);
                assert!(!unique.contains(&NodeId::new(node)));
                assert!(peers.iter().all(|peer| peer.index() < 6));
            }
        }
    }

    #[test]
    fn full_fan_out_reaches_everyone_else() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let peers: BTreeSet<_> = sample_peers(&mut rng, 4, NodeId::new(2), 3)
            .into_iter()
            .collect();
        assert_eq!(
            peers,
            BTreeSet::from([NodeId::new(0), NodeId::new(1), NodeId::new(3)])
        );
    }

    #[test]
    #[should_panic]
    fn oversized_fan_out_is_a_programming_error() {
        sample_peers(&mut ChaCha8Rng::seed_from_u64(3), 3, NodeId::new(0), 3);
    }

    #[tokio::test]
    async fn deferred_pull_leaves_puller_untouched() {
        let pool = Arc::new(NodePool::create(2, 0.0, ChaCha8Rng::seed_from_u64(0)).unwrap());
        pool.node(NodeId::new(1)).inform();

        let staged = pull_from_all(
            &pool,
            NodeId::new(0),
            vec![NodeId::new(1)],
            ReplyVisibility::Deferred,
        )
        .await
        .unwrap();
        assert!(staged);
        assert!(!pool.node(NodeId::new(0)).is_informed());

        pull_from_all(
            &pool,
            NodeId::new(0),
            vec![NodeId::new(1)],
            ReplyVisibility::Immediate,
        )
        .await
        .unwrap();
        assert!(pool.node(NodeId::new(0)).is_informed());
    }
}
