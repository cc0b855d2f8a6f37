use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::abstractions::communication::DiscardCounters;
use crate::error::{DisseminationError, Result};

/// Fair-loss links: every message attempt is independently dropped with a
/// fixed probability.
///
/// The random source and the counters share one lock, so concurrent exchange
/// tasks see a serialized sequence of draws.
#[derive(Debug)]
pub struct FairLossPointToPointLinks {
    loss_probability: f64,
    state: Mutex<LinkState>,
}

#[derive(Debug)]
struct LinkState {
    rng: ChaCha8Rng,
    counters: DiscardCounters,
}

impl FairLossPointToPointLinks {
    pub fn new(loss_probability: f64, rng: ChaCha8Rng) -> Result<Self> {
        if !(0.0..=1.0).contains(&loss_probability) {
            return Err(DisseminationError::InvalidConfiguration(format!(
                "loss probability {loss_probability} is outside [0, 1]"
            )));
        }

        Ok(Self {
            loss_probability,
            state: Mutex::new(LinkState {
                rng,
                counters: DiscardCounters::default(),
            }),
        })
    }

    pub fn loss_probability(&self) -> f64 {
        self.loss_probability
    }

    /// Records one attempt and decides whether it is lost.
    pub fn should_discard(&self) -> bool {
        let mut state = self.lock();
        state.counters.total += 1;

        let draw: f64 = state.rng.gen();
        let discard = draw < self.loss_probability;
        if discard {
            state.counters.discarded += 1;
        }
        discard
    }

    pub fn counters(&self) -> DiscardCounters {
        self.lock().counters
    }

    pub fn actual_discard_rate(&self) -> Result<f64> {
        self.counters()
            .rate()
            .ok_or(DisseminationError::DivisionUndefined)
    }

    // Counters and rng stay consistent across any panic point, so a poisoned
    // lock is still usable.
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
