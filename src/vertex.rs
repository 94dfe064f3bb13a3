use crate::context::Context;
use crate::error::{PregelError, Result};
use crate::message::Message;

use std::collections::VecDeque;
use std::sync::Arc;

/// An outgoing edge. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<E> {
    target: i64,
    value: E,
}

impl<E> Edge<E> {
    pub fn new(target: i64, value: E) -> Self {
        Edge { target, value }
    }

    pub fn target(&self) -> i64 {
        self.target
    }

    pub fn value(&self) -> &E {
        &self.value
    }
}

/// The user's algorithm, run once per active vertex per superstep.
pub trait Compute<V, E, M>: Send + Sync {
    fn compute(&self, vertex: &mut Vertex<V, E, M>) -> Result<()>;
}

impl<V, E, M, F> Compute<V, E, M> for F
where
    F: Fn(&mut Vertex<V, E, M>) -> Result<()> + Send + Sync,
{
    fn compute(&self, vertex: &mut Vertex<V, E, M>) -> Result<()> {
        self(vertex)
    }
}

/// A vertex of the graph together with its per-superstep mailboxes.
///
/// Vertices are built by a [`Reader`](crate::Reader) without a context;
/// the worker that ends up owning one attaches its [`Context`] while
/// loading. Operations that need the context fail with
/// [`PregelError::Detached`] until then.
#[derive(Debug)]
pub struct Vertex<V, E, M> {
    id: i64,
    value: V,
    active: bool,
    halted: bool,
    outer_edges: Vec<Edge<E>>,
    context: Option<Arc<Context>>,
    recv_queue: VecDeque<M>,
    send_queue: Vec<Message<M>>,
}

impl<V, E, M> Vertex<V, E, M> {
    pub fn new(id: i64, value: V, outer_edges: Vec<Edge<E>>) -> Self {
        Vertex {
            id,
            value,
            active: true,
            halted: false,
            outer_edges,
            context: None,
            recv_queue: VecDeque::new(),
            send_queue: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn set_value(&mut self, value: V) {
        self.value = value;
    }

    pub fn out_edges(&self) -> &[Edge<E>] {
        &self.outer_edges
    }

    /// Whether the vertex is scheduled to compute in the current superstep.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the vertex voted to halt in the superstep being computed.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    fn context(&self, operation: &'static str) -> Result<&Context> {
        self.context
            .as_deref()
            .ok_or(PregelError::Detached { operation })
    }

    pub fn superstep(&self) -> Result<u64> {
        Ok(self.context("superstep")?.superstep())
    }

    pub fn num_vertices(&self) -> Result<u64> {
        Ok(self.context("num_vertices")?.num_vertices())
    }

    /// Asks not to be computed from the next superstep on. A message
    /// arriving for this vertex overrides the vote.
    pub fn vote_to_halt(&mut self) -> Result<()> {
        self.context("vote_to_halt")?;
        self.halted = true;
        Ok(())
    }

    /// Queues `value` for `receiver`; it is delivered next superstep.
    pub fn send_message(&mut self, receiver: i64, value: M) -> Result<()> {
        let superstep = self.context("send_message")?.superstep();
        self.send_queue
            .push(Message::new(superstep, self.id, receiver, value));
        Ok(())
    }

    pub fn send_message_to_all_neighbors(&mut self, value: M) -> Result<()>
    where
        M: Clone,
    {
        let superstep = self
            .context("send_message_to_all_neighbors")?
            .superstep();
        for edge in &self.outer_edges {
            self.send_queue
                .push(Message::new(superstep, self.id, edge.target, value.clone()));
        }
        Ok(())
    }

    pub fn has_message(&self) -> Result<bool> {
        self.context("has_message")?;
        Ok(!self.recv_queue.is_empty())
    }

    /// Pops the next message of this superstep, in arrival order.
    pub fn next_message(&mut self) -> Result<M> {
        self.context("next_message")?;
        self.recv_queue
            .pop_front()
            .ok_or(PregelError::EmptyInbox { vertex: self.id })
    }

    pub(crate) fn attach(&mut self, context: Arc<Context>) {
        self.context = Some(context);
        self.active = true;
        self.halted = false;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Fills the inbox for the superstep about to be computed.
    pub(crate) fn deliver(&mut self, messages: impl IntoIterator<Item = M>) {
        self.recv_queue.clear();
        self.recv_queue.extend(messages);
        self.halted = false;
    }

    /// Ends the vertex's superstep: drops unread messages and hands back
    /// the halt vote and everything it sent.
    pub(crate) fn finish_superstep(&mut self) -> (bool, Vec<Message<M>>) {
        self.recv_queue.clear();
        (self.halted, std::mem::take(&mut self.send_queue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(id: i64) -> Vertex<f64, f64, f64> {
        let mut vertex = Vertex::new(
            id,
            0.0,
            vec![Edge::new(id + 1, 1.0), Edge::new(id + 2, 2.0)],
        );
        let context = Arc::new(Context::new(1, 1, 3));
        context.set_superstep(4);
        vertex.attach(context);
        vertex
    }

    #[test]
    fn detached_operations_fail() {
        let mut vertex: Vertex<(), (), i32> = Vertex::new(0, (), vec![]);
        assert!(matches!(
            vertex.superstep(),
            Err(PregelError::Detached {
                operation: "superstep"
            })
        ));
        assert!(matches!(
            vertex.send_message(1, 1),
            Err(PregelError::Detached { .. })
        ));
        assert!(vertex.vote_to_halt().is_err());
        assert!(vertex.has_message().is_err());
        // Plain accessors do not need a context.
        assert_eq!(vertex.id(), 0);
        vertex.set_value(());
    }

    #[test]
    fn inbox_is_fifo_and_empty_inbox_is_an_error() {
        let mut vertex = attached(0);
        vertex.deliver([1.0, 2.0, 3.0]);
        assert!(vertex.has_message().unwrap());
        assert_eq!(vertex.next_message().unwrap(), 1.0);
        assert_eq!(vertex.next_message().unwrap(), 2.0);
        assert_eq!(vertex.next_message().unwrap(), 3.0);
        assert!(!vertex.has_message().unwrap());
        assert!(matches!(
            vertex.next_message(),
            Err(PregelError::EmptyInbox { vertex: 0 })
        ));
    }

    #[test]
    fn sent_messages_are_stamped_and_queued() {
        let mut vertex = attached(5);
        vertex.send_message(9, 0.5).unwrap();
        vertex.send_message_to_all_neighbors(1.5).unwrap();
        vertex.vote_to_halt().unwrap();

        let (halted, sent) = vertex.finish_superstep();
        assert!(halted);
        assert_eq!(
            sent,
            vec![
                Message::new(4, 5, 9, 0.5),
                Message::new(4, 5, 6, 1.5),
                Message::new(4, 5, 7, 1.5),
            ]
        );
        assert!(vertex.finish_superstep().1.is_empty());
    }

    #[test]
    fn delivery_resets_halt_vote() {
        let mut vertex = attached(0);
        vertex.vote_to_halt().unwrap();
        vertex.deliver([7.0]);
        assert!(!vertex.is_halted());
    }
}
