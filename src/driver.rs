//! The round loop and the run it belongs to.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

use crate::abstractions::communication::DiscardCounters;
use crate::abstractions::logging::{RunResult, RunSummary, ScopedRunLogger};
use crate::abstractions::process::NodePool;
use crate::abstractions::NodeId;
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::protocols::DisseminationProtocol;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub round: usize,
    pub informed: usize,
    pub uninformed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Converged {
        rounds: usize,
    },
    Failed {
        rounds: usize,
        uninformed: Vec<NodeId>,
        /// Set when the run was cut short by a fault or a cancellation
        /// rather than by the round limit.
        fault: Option<String>,
    },
}

impl RunOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, RunOutcome::Converged { .. })
    }

    pub fn rounds(&self) -> usize {
        match self {
            RunOutcome::Converged { rounds } | RunOutcome::Failed { rounds, .. } => *rounds,
        }
    }
}

pub struct RoundDriver {
    limit: usize,
    cancel: CancellationToken,
}

impl RoundDriver {
    pub fn new(limit: usize, cancel: CancellationToken) -> Self {
        Self { limit, cancel }
    }

    /// Faults inside a round end the run as failed instead of propagating.
    /// Cancellation is only observed between rounds.
    pub async fn drive(
        &self,
        protocol: &mut DisseminationProtocol,
        logger: &ScopedRunLogger,
    ) -> (RunOutcome, Vec<RoundRecord>) {
        let pool = Arc::clone(protocol.pool());
        let mut history = Vec::new();

        if pool.is_fully_informed() {
            return (RunOutcome::Converged { rounds: 0 }, history);
        }

        for round in 1..=self.limit {
            if self.cancel.is_cancelled() {
                warn!(round, "run cancelled");
                return (failed(&pool, round - 1, Some("cancelled")), history);
            }

            let converged = match protocol.exchange().await {
                Ok(converged) => converged,
                Err(err) => {
                    error!(
                        round,
                        limit = self.limit,
                        error = %err,
                        "unexpected fault during exchange"
                    );
                    return (failed(&pool, round, Some(&err.to_string())), history);
                }
            };

            let record = RoundRecord {
                round,
                informed: pool.count_informed(true),
                uninformed: pool.count_informed(false),
            };
            logger.round(round, self.limit, record.informed, record.uninformed);
            history.push(record);

            if converged {
                return (RunOutcome::Converged { rounds: round }, history);
            }
        }

        (failed(&pool, self.limit, None), history)
    }
}

fn failed(pool: &NodePool, rounds: usize, fault: Option<&str>) -> RunOutcome {
    RunOutcome::Failed {
        rounds,
        uninformed: pool.informed_nodes(false).into_iter().collect(),
        fault: fault.map(str::to_owned),
    }
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub config: SimulationConfig,
    pub outcome: RunOutcome,
    pub history: Vec<RoundRecord>,
    pub counters: DiscardCounters,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let limit = self.config.round_limit;
        let result = match &self.outcome {
            RunOutcome::Converged { rounds } => RunResult::Succeeded {
                rounds: *rounds,
                limit,
            },
            RunOutcome::Failed {
                rounds, uninformed, ..
            } => RunResult::Failed {
                rounds: *rounds,
                limit,
                uninformed: uninformed.clone(),
            },
        };
        RunSummary {
            protocol: self.config.protocol,
            loss_percent: self.config.loss_percent(),
            result,
        }
    }
}

pub struct Simulation {
    config: SimulationConfig,
    logger: ScopedRunLogger,
    protocol: DisseminationProtocol,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut master = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        // Separate streams keep loss draws from shifting peer selection.
        let link_rng = ChaCha8Rng::seed_from_u64(master.gen());
        let selection_rng = ChaCha8Rng::seed_from_u64(master.gen());

        let pool = Arc::new(NodePool::create(
            config.node_count,
            config.loss_probability,
            link_rng,
        )?);
        let protocol = DisseminationProtocol::new(
            config.protocol,
            pool,
            selection_rng,
            config.reply_visibility,
        );
        let logger = ScopedRunLogger::new(Uuid::new_v4(), config.protocol);

        Ok(Self {
            config,
            logger,
            protocol,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        self.protocol.pool()
    }

    pub async fn step(&mut self) -> Result<bool> {
        self.protocol.exchange().await
    }

    /// The pool is released when this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> RunReport {
        let driver = RoundDriver::new(self.config.round_limit, cancel);
        let span = self.logger.span().clone();
        let (outcome, history) = driver
            .drive(&mut self.protocol, &self.logger)
            .instrument(span)
            .await;

        let report = RunReport {
            run_id: self.logger.run_id(),
            counters: self.pool().counters(),
            config: self.config,
            outcome,
            history,
        };
        self.logger.finish(&report.summary());
        report
    }
}
