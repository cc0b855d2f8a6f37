use std::fmt;
use std::str::FromStr;

use tracing::{info, info_span, Span};
use uuid::Uuid;

use crate::abstractions::NodeId;
use crate::config::ProtocolKind;
use crate::error::{DisseminationError, Result};

pub struct ScopedRunLogger {
    run_id: Uuid,
    span: Span,
}

impl ScopedRunLogger {
    pub fn new(run_id: Uuid, protocol: ProtocolKind) -> Self {
        let span = info_span!("run", %run_id, proto = protocol.name());
        Self { run_id, span }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn round(&self, round: usize, limit: usize, informed: usize, uninformed: usize) {
        let _entered = self.span.enter();
        info!(
            "round [{round}/{limit}]: {}/{informed}/{uninformed}; (total/informed/uninformed)",
            informed + uninformed
        );
    }

    pub fn finish(&self, summary: &RunSummary) {
        let _entered = self.span.enter();
        match &summary.result {
            RunResult::Succeeded { rounds, limit } => {
                info!("SUCCEED in dissemination: ({rounds}/{limit}) rounds")
            }
            RunResult::Failed {
                rounds,
                limit,
                uninformed,
            } => info!(
                uninformed = uninformed.len(),
                "FAILED to disseminate pool: ({rounds}/{limit}) rounds"
            ),
        }
    }
}

/// One machine-parseable line per run, consumed by plotting tools.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub protocol: ProtocolKind,
    pub loss_percent: f64,
    pub result: RunResult,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunResult {
    Succeeded {
        rounds: usize,
        limit: usize,
    },
    Failed {
        rounds: usize,
        limit: usize,
        uninformed: Vec<NodeId>,
    },
}

const SUCCEED: &str = "SUCCEED in dissemination: (";
const FAILED: &str = "FAILED to disseminate pool: (";
const ROUNDS: &str = ") rounds";

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .protocol
            .group_sizes()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "PROTO: {}; LOSS: {}%; ARGS: {args}; ",
            self.protocol.name(),
            self.loss_percent
        )?;

        match &self.result {
            RunResult::Succeeded { rounds, limit } => {
                write!(f, "{SUCCEED}{rounds}/{limit}{ROUNDS}")
            }
            RunResult::Failed {
                rounds,
                limit,
                uninformed,
            } => {
                let uninformed = uninformed
                    .iter()
                    .map(|id| id.index().to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{FAILED}{rounds}/{limit}{ROUNDS}; UNINFORMED: {uninformed}")
            }
        }
    }
}

impl FromStr for RunSummary {
    type Err = DisseminationError;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.trim_end().split(';').map(str::trim);

        let protocol = field(&mut fields, "PROTO:")?;
        let loss = field(&mut fields, "LOSS:")?;
        let args = field(&mut fields, "ARGS:")?;
        let outcome = fields.next().ok_or_else(|| malformed("missing result"))?;

        let loss_percent = loss
            .strip_suffix('%')
            .and_then(|loss| loss.parse().ok())
            .ok_or_else(|| malformed(format!("bad loss `{loss}`")))?;
        let group_sizes = args
            .split_whitespace()
            .map(|arg| arg.parse().map_err(|_| malformed(format!("bad arg `{arg}`"))))
            .collect::<Result<Vec<usize>>>()?;
        let protocol = ProtocolKind::from_parts(protocol, &group_sizes)?;

        let result = if let Some(rest) = outcome.strip_prefix(SUCCEED) {
            let (rounds, limit) = rounds(rest)?;
            RunResult::Succeeded { rounds, limit }
        } else if let Some(rest) = outcome.strip_prefix(FAILED) {
            let (rounds, limit) = rounds(rest)?;
            let uninformed = field(&mut fields, "UNINFORMED:")?
                .split(',')
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse()
                        .map(NodeId::new)
                        .map_err(|_| malformed(format!("bad node `{id}`")))
                })
                .collect::<Result<_>>()?;
            RunResult::Failed {
                rounds,
                limit,
                uninformed,
            }
        } else {
            return Err(malformed(format!("unknown result `{outcome}`")));
        };

        Ok(Self {
            protocol,
            loss_percent,
            result,
        })
    }
}

fn field<'a>(fields: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    fields
        .next()
        .and_then(|field| field.strip_prefix(name))
        .map(str::trim)
        .ok_or_else(|| malformed(format!("missing `{name}`")))
}

fn rounds(rest: &str) -> Result<(usize, usize)> {
    rest.strip_suffix(ROUNDS)
        .and_then(|counts| counts.split_once('/'))
        .and_then(|(rounds, limit)| Some((rounds.parse().ok()?, limit.parse().ok()?)))
        .ok_or_else(|| malformed(format!("bad round count `{rest}`")))
}

fn malformed(reason: impl Into<String>) -> DisseminationError {
    DisseminationError::MalformedSummary(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GossipMode;

    #[test]
    fn success_line_format() {
        let summary = RunSummary {
            protocol: ProtocolKind::Gossip(GossipMode::Push { group_size: 2 }),
            loss_percent: 10.0,
            result: RunResult::Succeeded {
                rounds: 4,
                limit: 100,
            },
        };
        let line = summary.to_string();
        assert_eq!(
            line,
            "PROTO: gossip-push; LOSS: 10%; ARGS: 2; SUCCEED in dissemination: (4/100) rounds"
        );
        assert_eq!(line.parse::<RunSummary>(), Ok(summary));
    }

    #[test]
    fn failure_line_carries_uninformed_nodes() {
        let summary = RunSummary {
            protocol: ProtocolKind::Gossip(GossipMode::PushPull {
                push_group_size: 1,
                pull_group_size: 1,
            }),
            loss_percent: 50.0,
            result: RunResult::Failed {
                rounds: 3,
                limit: 3,
                uninformed: vec![NodeId::new(1), NodeId::new(3)],
            },
        };
        let line = summary.to_string();
        assert!(line.ends_with("FAILED to disseminate pool: (3/3) rounds; UNINFORMED: 1,3"));
        assert_eq!(line.parse::<RunSummary>(), Ok(summary));
    }

    #[test]
    fn rejects_garbage() {
        for line in [
            "",
            "PROTO: multicast; LOSS: x%; ARGS: 2; SUCCEED in dissemination: (1/1) rounds",
            "PROTO: multicast; LOSS: 0%; ARGS: 2; maybe",
            "PROTO: multicast; LOSS: 0%; ARGS: 2; FAILED to disseminate pool: (1/1) rounds",
        ] {
            assert!(
                matches!(
                    line.parse::<RunSummary>(),
                    Err(DisseminationError::MalformedSummary(_))
                ),
                "`{line}` should be rejected"
            );
        }
    }

    #[test]
    fn unknown_protocol_is_not_defaulted() {
        let line = "PROTO: flood; LOSS: 0%; ARGS: 2; SUCCEED in dissemination: (1/1) rounds";
        assert_eq!(
            line.parse::<RunSummary>(),
            Err(DisseminationError::ProtocolModeUnimplemented("flood".to_owned()))
        );
    }
}
