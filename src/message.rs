/// A value travelling from one vertex to another.
///
/// A message produced in superstep `s` is delivered to its receiver in
/// superstep `s + 1`, never earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<M> {
    pub superstep: u64,
    pub sender: i64,
    pub receiver: i64,
    pub value: M,
}

impl<M> Message<M> {
    pub fn new(superstep: u64, sender: i64, receiver: i64, value: M) -> Self {
        Message {
            superstep,
            sender,
            receiver,
            value,
        }
    }

    pub fn into_value(self) -> M {
        self.value
    }
}
