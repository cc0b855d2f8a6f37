use clap::{ArgAction, Parser, Subcommand};
use const_format::concatcp;
use epidemic_dissemination::{
    GossipMode, ProtocolKind, ReplyVisibility, Simulation, SimulationConfig,
};
use eyre::Result as EyreResult;
use tokio_util::sync::CancellationToken;

pub const EXAMPLES: &str = r"
  # Ring multicast to the next 3 nodes, 20 nodes, 10% loss
  $ disseminator -n 20 --loss 10 multicast 3

  # Push-pull gossip, 5 trials with reproducible seeds
  $ disseminator -n 64 --seed 42 --trials 5 gossip push-pull 2 1
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!("Examples:", EXAMPLES))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Number of nodes
    #[arg(short, long, default_value_t = 3)]
    pub nodes: usize,

    /// Maximum rounds of simulation
    #[arg(short, long, default_value_t = 100)]
    pub limit: usize,

    /// Chance to lose a message, in percent
    #[arg(long, value_name = "PERCENT", default_value_t = 0.0)]
    pub loss: f64,

    /// Seed of the random source; consecutive trials use consecutive seeds
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of independent runs
    #[arg(long, default_value_t = 1)]
    pub trials: usize,

    /// Apply pull replies only after the pull sub-round has settled
    #[arg(long)]
    pub deferred_replies: bool,

    /// Raise verbosity: -v protocol events, -vv node events
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    /// Multicast with a group of one
    Singlecast,
    /// Multicast to the next GROUP nodes on the ring
    Multicast {
        #[arg(default_value_t = 2)]
        group: usize,
    },
    /// Multicast to every other node
    Broadcast,
    #[command(subcommand)]
    Gossip(GossipCommand),
}

#[derive(Debug, Subcommand)]
pub enum GossipCommand {
    /// Informed nodes push to GROUP random peers
    Push {
        #[arg(default_value_t = 2)]
        group: usize,
    },
    /// Uninformed nodes pull from GROUP random peers
    Pull {
        #[arg(default_value_t = 2)]
        group: usize,
    },
    /// Push sub-round followed by a pull sub-round
    PushPull {
        #[arg(default_value_t = 2)]
        push_group: usize,
        #[arg(default_value_t = 2)]
        pull_group: usize,
    },
}

impl RootCommand {
    pub fn protocol(&self) -> ProtocolKind {
        match self.action {
            SubCommands::Singlecast => ProtocolKind::Multicast { group_size: 1 },
            SubCommands::Multicast { group } => ProtocolKind::Multicast { group_size: group },
            SubCommands::Broadcast => ProtocolKind::Multicast {
                group_size: self.args.nodes.saturating_sub(1).max(1),
            },
            SubCommands::Gossip(GossipCommand::Push { group }) => {
                ProtocolKind::Gossip(GossipMode::Push { group_size: group })
            }
            SubCommands::Gossip(GossipCommand::Pull { group }) => {
                ProtocolKind::Gossip(GossipMode::Pull { group_size: group })
            }
            SubCommands::Gossip(GossipCommand::PushPull {
                push_group,
                pull_group,
            }) => ProtocolKind::Gossip(GossipMode::PushPull {
                push_group_size: push_group,
                pull_group_size: pull_group,
            }),
        }
    }

    pub fn config(&self, trial: usize) -> SimulationConfig {
        let reply_visibility = if self.args.deferred_replies {
            ReplyVisibility::Deferred
        } else {
            ReplyVisibility::Immediate
        };
        let config = SimulationConfig::new(self.args.nodes, self.args.limit, self.protocol())
            .with_loss_percent(self.args.loss)
            .with_reply_visibility(reply_visibility);

        match self.args.seed {
            Some(seed) => config.with_seed(seed.wrapping_add(trial as u64)),
            None => config,
        }
    }

    /// Runs every trial and prints one summary line per run on stdout.
    pub async fn run(self, cancel: CancellationToken) -> EyreResult<()> {
        for trial in 0..self.args.trials {
            if cancel.is_cancelled() {
                break;
            }
            let simulation = Simulation::new(self.config(trial))?;
            let report = simulation.run(cancel.clone()).await;
            println!("{}", report.summary());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RootCommand {
        RootCommand::try_parse_from(std::iter::once("disseminator").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_a_small_pool() {
        let command = parse(&["multicast"]);
        assert_eq!(command.args.nodes, 3);
        assert_eq!(command.args.limit, 100);
        assert_eq!(command.protocol(), ProtocolKind::Multicast { group_size: 2 });
    }

    #[test]
    fn broadcast_reaches_every_other_node() {
        let command = parse(&["-n", "7", "broadcast"]);
        assert_eq!(command.protocol(), ProtocolKind::Multicast { group_size: 6 });
    }

    #[test]
    fn push_pull_takes_two_groups() {
        let command = parse(&["-n", "9", "--loss", "25", "gossip", "push-pull", "3", "1"]);
        let config = command.config(0);
        assert_eq!(
            config.protocol,
            ProtocolKind::Gossip(GossipMode::PushPull {
                push_group_size: 3,
                pull_group_size: 1,
            })
        );
        assert_eq!(config.loss_probability, 0.25);
    }

    #[test]
    fn trials_advance_the_seed() {
        let command = parse(&["--seed", "10", "--trials", "3", "singlecast"]);
        assert_eq!(command.config(2).seed, Some(12));
    }

    #[test]
    fn unknown_gossip_mode_is_rejected() {
        let result = RootCommand::try_parse_from(["disseminator", "gossip", "shout"]);
        assert!(result.is_err());
    }
}
