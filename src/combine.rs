use crate::error::{PregelError, Result};
use crate::message::Message;

use std::ops::Add;

/// Merges two message values bound for the same vertex into one.
///
/// The operation must be associative, and should be commutative, so that
/// any grouping of pending messages yields the same value. Combining is
/// only an optimization: programs must give the same answer without it.
pub trait Combine<M>: Send + Sync {
    fn combine(&self, a: M, b: M) -> M;

    /// Lifts [`combine`](Combine::combine) to whole messages. The result
    /// keeps the receiver and superstep of its inputs and the sender of the
    /// first one.
    fn combine_messages(&self, a: Message<M>, b: Message<M>) -> Result<Message<M>> {
        if a.receiver != b.receiver {
            return Err(PregelError::Contract(format!(
                "cannot combine messages for different vertices {} and {}",
                a.receiver, b.receiver
            )));
        }
        if a.superstep != b.superstep {
            return Err(PregelError::Contract(format!(
                "cannot combine messages from supersteps {} and {}",
                a.superstep, b.superstep
            )));
        }

        let Message {
            superstep,
            sender,
            receiver,
            value,
        } = a;
        Ok(Message::new(
            superstep,
            sender,
            receiver,
            self.combine(value, b.value),
        ))
    }
}

impl<M, F> Combine<M> for F
where
    F: Fn(M, M) -> M + Send + Sync,
{
    fn combine(&self, a: M, b: M) -> M {
        self(a, b)
    }
}

/// Adds message values together.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombiner;

impl<M: Add<Output = M>> Combine<M> for SumCombiner {
    fn combine(&self, a: M, b: M) -> M {
        a + b
    }
}

/// Keeps the smaller of two message values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinCombiner;

impl<M: PartialOrd> Combine<M> for MinCombiner {
    fn combine(&self, a: M, b: M) -> M {
        if b < a {
            b
        } else {
            a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_two_messages_for_the_same_vertex() {
        let a = Message::new(3, 10, 7, 5_i64);
        let b = Message::new(3, 11, 7, 3_i64);
        let c = SumCombiner.combine_messages(a, b).unwrap();
        assert_eq!(c, Message::new(3, 10, 7, 8));
    }

    #[test]
    fn min_keeps_the_smaller_value() {
        assert_eq!(MinCombiner.combine(4.0_f64, 2.5), 2.5);
        assert_eq!(MinCombiner.combine(1_u32, 9), 1);
    }

    #[test]
    fn closures_are_combiners() {
        let max = |a: i32, b: i32| a.max(b);
        assert_eq!(max.combine(3, 8), 8);
    }

    #[test]
    fn mismatched_receivers_are_rejected() {
        let a = Message::new(1, 0, 1, 1_i64);
        let b = Message::new(1, 0, 2, 1_i64);
        assert!(matches!(
            SumCombiner.combine_messages(a, b),
            Err(PregelError::Contract(_))
        ));
    }

    #[test]
    fn mismatched_supersteps_are_rejected() {
        let a = Message::new(1, 0, 1, 1_i64);
        let b = Message::new(2, 0, 1, 1_i64);
        assert!(SumCombiner.combine_messages(a, b).is_err());
    }

    #[test]
    fn sum_and_min_are_associative() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let (x, y, z): (i64, i64, i64) = (
                rng.gen_range(-1000..1000),
                rng.gen_range(-1000..1000),
                rng.gen_range(-1000..1000),
            );
            assert_eq!(
                SumCombiner.combine(SumCombiner.combine(x, y), z),
                SumCombiner.combine(x, SumCombiner.combine(y, z))
            );
            assert_eq!(
                MinCombiner.combine(MinCombiner.combine(x, y), z),
                MinCombiner.combine(x, MinCombiner.combine(y, z))
            );
        }
    }
}
