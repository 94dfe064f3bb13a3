use crate::error::{PregelError, Result};

/**
 * Worker state.
 *
 * LOADING ---> COMPUTE ---> SENDING ---> BARRIER ---> RECEIVING ---> REDUCING
 *    |            ^                                                      |
 *    |            |                                                      |
 *    |             ------------------------------------------------------|
 *    |                                                                   v
 *     ---------------------------------------------------------> TERMINATED ---> WRITING
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Loading,    // receiving partition batches from the master.
    Compute,    // running compute on active vertices.
    Sending,    // flushing the send pipeline.
    Barrier,    // waiting for every participant to finish sending.
    Receiving,  // draining the receive pipeline.
    Reducing,   // reporting the local active count.
    Terminated, // the master broadcast the terminal sentinel.
    Writing,    // serializing vertices for the master.
}

impl State {
    fn can_become(self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (Loading, Compute)
                | (Loading, Terminated)
                | (Compute, Sending)
                | (Sending, Barrier)
                | (Barrier, Receiving)
                | (Receiving, Reducing)
                | (Reducing, Compute)
                | (Reducing, Terminated)
                | (Terminated, Writing)
        )
    }

    /// Moves to `next`, refusing transitions the protocol does not allow.
    pub fn advance(&mut self, next: State) -> Result<()> {
        if !self.can_become(next) {
            return Err(PregelError::Coordination(format!(
                "illegal state transition {:?} -> {:?}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut state = State::Loading;
        for next in [
            State::Compute,
            State::Sending,
            State::Barrier,
            State::Receiving,
            State::Reducing,
            State::Compute,
            State::Sending,
            State::Barrier,
            State::Receiving,
            State::Reducing,
            State::Terminated,
            State::Writing,
        ] {
            state.advance(next).unwrap();
        }
        assert_eq!(state, State::Writing);
    }

    #[test]
    fn writing_is_terminal() {
        let mut state = State::Writing;
        assert!(state.advance(State::Compute).is_err());
        assert!(state.advance(State::Loading).is_err());
    }

    #[test]
    fn cannot_skip_the_barrier() {
        let mut state = State::Sending;
        assert!(state.advance(State::Receiving).is_err());
        assert_eq!(state, State::Sending);
    }
}
