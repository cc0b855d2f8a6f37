pub mod fair_loss_point_to_point_links;

/// Point-to-point delivery between two processes of the same pool.
pub trait LinkSender<I, M> {
    /// Attempts one directed message from `from` to `to`.
    ///
    /// Returns the receiver's immediate reply, if it produced one. A message
    /// lost in transit yields `None` just like a message that needs no reply.
    fn send(&self, from: I, to: I, message: M) -> Option<M>;
}

/// Running totals of the loss model.
///
/// `discarded <= total` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiscardCounters {
    pub total: u64,
    pub discarded: u64,
}

impl DiscardCounters {
    /// `discarded / total`, or `None` while no attempt has been made.
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.discarded as f64 / self.total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_undefined_without_attempts() {
        assert_eq!(DiscardCounters::default().rate(), None);
    }

    #[test]
    fn rate_divides_discarded_by_total() {
        let counters = DiscardCounters {
            total: 8,
            discarded: 2,
        };
        assert_eq!(counters.rate(), Some(0.25));
    }
}
