use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::abstractions::communication::fair_loss_point_to_point_links::FairLossPointToPointLinks;
use crate::abstractions::communication::{DiscardCounters, LinkSender};
use crate::abstractions::{Message, NodeId};
use crate::error::{DisseminationError, Result};

/// A simulated peer.
///
/// `informed` only ever goes from `false` to `true`.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    informed: AtomicBool,
}

impl Node {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            informed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_informed(&self) -> bool {
        self.informed.load(Ordering::Acquire)
    }

    /// Marks the node informed. Returns `true` if this call made the transition.
    pub fn inform(&self) -> bool {
        !self.informed.swap(true, Ordering::AcqRel)
    }

    /// Applies a delivered message and returns the immediate reply, if any.
    pub fn receive(&self, from: NodeId, message: Message) -> Option<Message> {
        match message {
            Message::Push => {
                if self.inform() {
                    trace!(node = %self.id, %from, "informed by push");
                }
                None
            }
            Message::Pull => {
                let informed = self.is_informed();
                trace!(node = %self.id, %from, informed, "pull received");
                informed.then_some(Message::Push)
            }
        }
    }
}

/// The fixed population of one simulation run together with its loss model.
///
/// Owned by the run; dropping it releases the nodes.
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<Node>,
    links: FairLossPointToPointLinks,
}

impl NodePool {
    pub fn create(node_count: usize, loss_probability: f64, rng: ChaCha8Rng) -> Result<Self> {
        if node_count == 0 {
            return Err(DisseminationError::InvalidConfiguration(
                "node count should be positive".to_owned(),
            ));
        }
        let links = FairLossPointToPointLinks::new(loss_probability, rng)?;
        let nodes = (0..node_count).map(|i| Node::new(NodeId::new(i))).collect();

        debug!(node_count, loss_probability, "node pool created");

        Ok(Self { nodes, links })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// # Panics
    ///
    /// If `id` does not belong to this pool.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn loss_probability(&self) -> f64 {
        self.links.loss_probability()
    }

    pub fn should_discard(&self) -> bool {
        self.links.should_discard()
    }

    pub fn is_fully_informed(&self) -> bool {
        self.nodes.iter().all(Node::is_informed)
    }

    /// Identities of every node whose flag equals `target`.
    pub fn informed_nodes(&self, target: bool) -> BTreeSet<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.is_informed() == target)
            .map(Node::id)
            .collect()
    }

    pub fn count_informed(&self, target: bool) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.is_informed() == target)
            .count()
    }

    pub fn counters(&self) -> DiscardCounters {
        self.links.counters()
    }

    /// Fails with [`DisseminationError::DivisionUndefined`] until the first attempt.
    pub fn actual_discard_rate(&self) -> Result<f64> {
        self.links.actual_discard_rate()
    }
}

impl LinkSender<NodeId, Message> for NodePool {
    fn send(&self, from: NodeId, to: NodeId, message: Message) -> Option<Message> {
        if self.should_discard() {
            trace!(%from, %to, ?message, "message lost");
            return None;
        }
        self.node(to).receive(from, message)
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        let counters = self.links.counters();
        debug!(
            nodes = self.nodes.len(),
            total = counters.total,
            discarded = counters.discarded,
            "node pool released"
        );
    }
}
