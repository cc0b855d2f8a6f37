use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::IteratorRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::abstractions::process::NodePool;
use crate::abstractions::NodeId;
use crate::config::{GossipMode, ReplyVisibility};
use crate::error::Result;
use crate::protocols::{pull_from_all, push_to_all, sample_peers};

/// Randomized push, pull or push-pull dissemination.
///
/// Peers are chosen uniformly without replacement and without regard to
/// whether they are informed.
pub struct Gossip {
    pool: Arc<NodePool>,
    mode: GossipMode,
    reply_visibility: ReplyVisibility,
    rng: ChaCha8Rng,
    push_queue: BTreeSet<NodeId>,
    pull_queue: BTreeSet<NodeId>,
}

impl Gossip {
    /// Informs one uninformed node picked at random. A pool without
    /// uninformed nodes is left as is.
    pub fn new(
        pool: Arc<NodePool>,
        mode: GossipMode,
        mut rng: ChaCha8Rng,
        reply_visibility: ReplyVisibility,
    ) -> Self {
        let mut push_queue = BTreeSet::new();
        if let Some(origin) = pool.informed_nodes(false).into_iter().choose(&mut rng) {
            pool.node(origin).inform();
            push_queue.insert(origin);
            debug!(%origin, "gossip seeded");
        }
        let pull_queue = pool.informed_nodes(false);

        Self {
            pool,
            mode,
            reply_visibility,
            rng,
            push_queue,
            pull_queue,
        }
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    pub async fn exchange(&mut self) -> Result<bool> {
        // A lone node has no peers to sample.
        if self.pool.len() < 2 {
            self.push_queue.clear();
            self.pull_queue.clear();
            return Ok(self.pool.is_fully_informed());
        }

        match self.mode {
            GossipMode::Push { group_size } => self.push_round(group_size).await?,
            GossipMode::Pull { group_size } => self.pull_round(group_size).await?,
            GossipMode::PushPull {
                push_group_size,
                pull_group_size,
            } => {
                self.push_round(push_group_size).await?;
                self.pull_round(pull_group_size).await?;
            }
        }

        // Informed nodes push, uninformed ones pull, starting next round.
        self.push_queue = self.pool.informed_nodes(true);
        self.pull_queue = self.pool.informed_nodes(false);
        Ok(self.pool.is_fully_informed())
    }

    async fn push_round(&mut self, group_size: usize) -> Result<()> {
        let node_count = self.pool.len();

        while let Some(sender) = self.push_queue.pop_first() {
            let receivers = sample_peers(&mut self.rng, node_count, sender, group_size);
            debug!(%sender, ?receivers, "push");
            push_to_all(&self.pool, sender, receivers).await?;
        }
        Ok(())
    }

    async fn pull_round(&mut self, group_size: usize) -> Result<()> {
        let node_count = self.pool.len();
        let mut staged = BTreeSet::new();

        while let Some(puller) = self.pull_queue.pop_first() {
            let peers = sample_peers(&mut self.rng, node_count, puller, group_size);
            debug!(%puller, ?peers, "pull");
            if pull_from_all(&self.pool, puller, peers, self.reply_visibility).await? {
                staged.insert(puller);
            }
        }

        for puller in staged {
            if self.pool.node(puller).inform() {
                trace!(node = %puller, "informed by staged reply");
            }
        }
        Ok(())
    }
}
