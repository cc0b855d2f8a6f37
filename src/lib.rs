//! Epidemic-style information dissemination over a simulated pool of nodes.
//!
//! A run seeds one piece of information into a [`NodePool`] and repeatedly
//! calls one round of a [`DisseminationProtocol`] (ring multicast or
//! push/pull gossip) until every node is informed or the round limit is hit.
//! Messages travel over fair-loss links that drop each attempt with a fixed
//! probability.

pub mod abstractions;
pub mod config;
pub mod driver;
pub mod error;
pub mod protocols;

pub use abstractions::communication::DiscardCounters;
pub use abstractions::logging::{RunResult, RunSummary};
pub use abstractions::process::{Node, NodePool};
pub use abstractions::{Message, NodeId};
pub use config::{GossipMode, ProtocolKind, ReplyVisibility, SimulationConfig};
pub use driver::{RoundDriver, RoundRecord, RunOutcome, RunReport, Simulation};
pub use error::{DisseminationError, Result};
pub use protocols::DisseminationProtocol;
