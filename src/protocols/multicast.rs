use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::abstractions::process::NodePool;
use crate::abstractions::NodeId;
use crate::error::Result;
use crate::protocols::push_to_all;

/// Deterministic ring sweep: every informed node pushes to its next
/// `group_size` successors.
pub struct Multicast {
    pool: Arc<NodePool>,
    group_size: usize,
    send_queue: BTreeSet<NodeId>,
}

impl Multicast {
    /// Node 0 starts out informed and is the only sender of the first round.
    pub fn new(pool: Arc<NodePool>, group_size: usize) -> Self {
        let origin = NodeId::new(0);
        pool.node(origin).inform();

        Self {
            pool,
            group_size,
            send_queue: BTreeSet::from([origin]),
        }
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    pub async fn exchange(&mut self) -> Result<bool> {
        let node_count = self.pool.len();

        while let Some(sender) = self.send_queue.pop_first() {
            let receivers = ring_successors(sender, self.group_size, node_count);
            debug!(%sender, ?receivers, "multicast");
            push_to_all(&self.pool, sender, receivers).await?;
        }

        // Nodes informed during this round start sending in the next one.
        self.send_queue = self.pool.informed_nodes(true);
        Ok(self.pool.is_fully_informed())
    }
}

/// The next `group_size` nodes after `sender` on the ring, wrapping around.
fn ring_successors(sender: NodeId, group_size: usize, node_count: usize) -> Vec<NodeId> {
    let reach = group_size.min(node_count.saturating_sub(1));
    (1..=reach)
        .map(|offset| NodeId::new((sender.index() + offset) % node_count))
        .collect()
}
