use std::fmt;

pub mod communication;
pub mod logging;
pub mod process;

/// Position of a node inside its pool. Stable for the lifetime of a run and
/// significant for the multicast ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// The whole protocol vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// The sender hands the information to the receiver.
    Push,
    /// The sender asks the receiver for the information.
    Pull,
}
