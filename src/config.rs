use std::fmt;

use crate::error::{DisseminationError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolKind {
    Multicast { group_size: usize },
    Gossip(GossipMode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GossipMode {
    Push {
        group_size: usize,
    },
    Pull {
        group_size: usize,
    },
    PushPull {
        push_group_size: usize,
        pull_group_size: usize,
    },
}

impl ProtocolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::Multicast { .. } => "multicast",
            ProtocolKind::Gossip(GossipMode::Push { .. }) => "gossip-push",
            ProtocolKind::Gossip(GossipMode::Pull { .. }) => "gossip-pull",
            ProtocolKind::Gossip(GossipMode::PushPull { .. }) => "gossip-push-pull",
        }
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        match *self {
            ProtocolKind::Multicast { group_size }
            | ProtocolKind::Gossip(GossipMode::Push { group_size })
            | ProtocolKind::Gossip(GossipMode::Pull { group_size }) => vec![group_size],
            ProtocolKind::Gossip(GossipMode::PushPull {
                push_group_size,
                pull_group_size,
            }) => vec![push_group_size, pull_group_size],
        }
    }

    /// Unknown names are rejected; there is no default mode.
    pub fn from_parts(name: &str, group_sizes: &[usize]) -> Result<Self> {
        let kind = match (name, group_sizes) {
            ("multicast", &[group_size]) => ProtocolKind::Multicast { group_size },
            ("gossip-push", &[group_size]) => {
                ProtocolKind::Gossip(GossipMode::Push { group_size })
            }
            ("gossip-pull", &[group_size]) => {
                ProtocolKind::Gossip(GossipMode::Pull { group_size })
            }
            ("gossip-push-pull", &[push_group_size, pull_group_size]) => {
                ProtocolKind::Gossip(GossipMode::PushPull {
                    push_group_size,
                    pull_group_size,
                })
            }
            ("multicast" | "gossip-push" | "gossip-pull" | "gossip-push-pull", _) => {
                return Err(DisseminationError::InvalidConfiguration(format!(
                    "{name} does not take {} group size(s)",
                    group_sizes.len()
                )))
            }
            _ => return Err(DisseminationError::ProtocolModeUnimplemented(name.to_owned())),
        };
        Ok(kind)
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a pull reply becomes visible to the rest of the pull sub-round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyVisibility {
    /// The puller is informed as soon as the reply is delivered and can answer
    /// later pulls of the same sub-round.
    #[default]
    Immediate,
    /// Reply transitions are staged and applied once the pull sub-round has
    /// settled.
    Deferred,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub node_count: usize,
    pub round_limit: usize,
    /// Per-message loss probability in `[0, 1]`.
    pub loss_probability: f64,
    pub protocol: ProtocolKind,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub reply_visibility: ReplyVisibility,
}

impl SimulationConfig {
    pub fn new(node_count: usize, round_limit: usize, protocol: ProtocolKind) -> Self {
        Self {
            node_count,
            round_limit,
            loss_probability: 0.0,
            protocol,
            seed: None,
            reply_visibility: ReplyVisibility::default(),
        }
    }

    pub fn with_loss_percent(self, percent: f64) -> Self {
        self.with_loss_probability(percent / 100.0)
    }

    pub fn with_loss_probability(mut self, probability: f64) -> Self {
        self.loss_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_reply_visibility(mut self, reply_visibility: ReplyVisibility) -> Self {
        self.reply_visibility = reply_visibility;
        self
    }

    /// Loss as a percentage, with float noise from the conversion rounded off.
    pub fn loss_percent(&self) -> f64 {
        (self.loss_probability * 100.0 * 1e9).round() / 1e9
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(invalid("node count should be positive"));
        }
        if self.round_limit == 0 {
            return Err(invalid("round limit should be positive"));
        }
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(invalid(format!(
                "loss should be between 0% and 100%, got {}%",
                self.loss_percent()
            )));
        }

        // A single node has no peers and never exchanges.
        let upper = self.node_count.max(2);
        for group_size in self.protocol.group_sizes() {
            if group_size == 0 || group_size >= upper {
                return Err(invalid(format!(
                    "{} group size should be between 1 and {}, got {group_size}",
                    self.protocol,
                    upper - 1
                )));
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> DisseminationError {
    DisseminationError::InvalidConfiguration(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(group_size: usize) -> ProtocolKind {
        ProtocolKind::Gossip(GossipMode::Push { group_size })
    }

    #[test]
    fn names_round_trip_through_from_parts() {
        let kinds = [
            ProtocolKind::Multicast { group_size: 2 },
            push(1),
            ProtocolKind::Gossip(GossipMode::Pull { group_size: 3 }),
            ProtocolKind::Gossip(GossipMode::PushPull {
                push_group_size: 1,
                pull_group_size: 2,
            }),
        ];
        for kind in kinds {
            assert_eq!(
                ProtocolKind::from_parts(kind.name(), &kind.group_sizes()),
                Ok(kind)
            );
        }
    }

    #[test]
    fn unknown_mode_is_a_hard_error() {
        assert_eq!(
            ProtocolKind::from_parts("gossip-shout", &[1]),
            Err(DisseminationError::ProtocolModeUnimplemented(
                "gossip-shout".to_owned()
            ))
        );
    }

    #[test]
    fn wrong_arity_is_invalid() {
        assert!(matches!(
            ProtocolKind::from_parts("gossip-push-pull", &[1]),
            Err(DisseminationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = SimulationConfig::new(4, 10, push(1));
        assert!(base.validate().is_ok());

        let cases = [
            SimulationConfig { node_count: 0, ..base.clone() },
            SimulationConfig { round_limit: 0, ..base.clone() },
            base.clone().with_loss_percent(120.0),
            base.clone().with_loss_probability(-0.01),
            SimulationConfig::new(4, 10, push(0)),
            SimulationConfig::new(4, 10, push(4)),
            SimulationConfig::new(4, 10, ProtocolKind::Multicast { group_size: 5 }),
        ];
        for config in cases {
            assert!(
                matches!(
                    config.validate(),
                    Err(DisseminationError::InvalidConfiguration(_))
                ),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn single_node_accepts_unit_group() {
        assert!(SimulationConfig::new(1, 1, push(1)).validate().is_ok());
        assert!(SimulationConfig::new(1, 1, push(2)).validate().is_err());
    }

    #[test]
    fn loss_percent_is_converted() {
        let config = SimulationConfig::new(3, 1, push(1)).with_loss_percent(25.0);
        assert_eq!(config.loss_probability, 0.25);
        assert_eq!(config.loss_percent(), 25.0);

        let config = config.with_loss_percent(7.0);
        assert_eq!(config.loss_percent(), 7.0);
    }
}
