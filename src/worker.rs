use crate::channel::{Control, Data, Report, WorkerLink};
use crate::combine::Combine;
use crate::config::Config;
use crate::context::Context;
use crate::error::{PregelError, Result};
use crate::io::{Record, Writer};
use crate::message::Message;
use crate::partition::partition;
use crate::state::State;
use crate::vertex::{Compute, Vertex};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

/// What the compute step hands to the sender pipeline.
enum Outgoing<M> {
    Message(Message<M>),
    EndOfRound,
}

/// Messages waiting in the sender pipeline for one peer.
///
/// With a combiner, at most one message per receiver is kept and later
/// arrivals are folded into it; receivers keep their first-arrival order.
struct PeerQueue<M> {
    queued: Vec<Message<M>>,
    order: Vec<i64>,
    pending: HashMap<i64, Message<M>>,
}

impl<M> PeerQueue<M> {
    fn new() -> Self {
        PeerQueue {
            queued: Vec::new(),
            order: Vec::new(),
            pending: HashMap::new(),
        }
    }

    fn push(&mut self, message: Message<M>, combiner: Option<&dyn Combine<M>>) -> Result<()> {
        match combiner {
            None => self.queued.push(message),
            Some(combiner) => {
                let receiver = message.receiver;
                let merged = match self.pending.remove(&receiver) {
                    Some(pending) => combiner.combine_messages(pending, message)?,
                    None => {
                        self.order.push(receiver);
                        message
                    }
                };
                self.pending.insert(receiver, merged);
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.queued.len() + self.pending.len()
    }

    fn drain(&mut self) -> Vec<Message<M>> {
        let mut batch = std::mem::take(&mut self.queued);
        for receiver in self.order.drain(..) {
            if let Some(message) = self.pending.remove(&receiver) {
                batch.push(message);
            }
        }
        batch
    }
}

/// The sender pipeline of one superstep. Returns how many messages it put
/// on the wire, after combining.
fn send_round<V, E, M>(
    link: &WorkerLink<V, E, M>,
    outgoing: Receiver<Outgoing<M>>,
    combiner: Option<&dyn Combine<M>>,
    nworkers: usize,
    batch_size: usize,
) -> Result<u64> {
    let mut queues: HashMap<usize, PeerQueue<M>> = HashMap::new();
    let mut n_sent = 0_u64;

    // A disconnect means the compute step gave up; it reports why.
    while let Ok(item) = outgoing.recv() {
        match item {
            Outgoing::Message(message) => {
                let rank = partition(message.receiver, nworkers);
                let queue = queues.entry(rank).or_insert_with(PeerQueue::new);
                queue.push(message, combiner)?;

                if queue.len() >= batch_size {
                    let batch = queue.drain();
                    n_sent += batch.len() as u64;
                    link.send_data(rank, Data::Messages(batch))?;
                }
            }
            Outgoing::EndOfRound => break,
        }
    }

    for (rank, mut queue) in queues {
        let batch = queue.drain();
        if !batch.is_empty() {
            n_sent += batch.len() as u64;
            link.send_data(rank, Data::Messages(batch))?;
        }
    }

    Ok(n_sent)
}

/// The receiver pipeline of one superstep. Collects everything peers send
/// until this worker's own end-of-round sentinel shows up.
fn receive_round<V, E, M>(link: &WorkerLink<V, E, M>) -> Result<Vec<Message<M>>> {
    let mut incoming = Vec::new();
    loop {
        match link.recv_data()? {
            Data::Messages(batch) => incoming.extend(batch),
            Data::EndOfRound => return Ok(incoming),
        }
    }
}

/// Gives up on a round: wakes the receiver pipeline, waits for it and
/// surfaces `err`.
fn abandon<T, V, E, M>(
    link: &WorkerLink<V, E, M>,
    receiver: ScopedJoinHandle<'_, Result<Vec<Message<M>>>>,
    err: PregelError,
) -> Result<T> {
    link.abort();
    let _ = join(receiver, "receive");
    Err(err)
}

fn join<T>(handle: ScopedJoinHandle<'_, Result<T>>, pipeline: &str) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(PregelError::Coordination(format!("{} pipeline panicked", pipeline))))
}

/// The vertices owned by a worker and their message generations.
struct Partition<V, E, M> {
    vertices: HashMap<i64, Vertex<V, E, M>>,
    active_vertices: BTreeSet<i64>,
    halted_vertices: BTreeSet<i64>,
    cur_messages: HashMap<i64, VecDeque<Message<M>>>,
    next_messages: HashMap<i64, VecDeque<Message<M>>>,
}

impl<V, E, M> Partition<V, E, M> {
    fn new() -> Self {
        Partition {
            vertices: HashMap::new(),
            active_vertices: BTreeSet::new(),
            halted_vertices: BTreeSet::new(),
            cur_messages: HashMap::new(),
            next_messages: HashMap::new(),
        }
    }

    fn add_vertex(&mut self, mut vertex: Vertex<V, E, M>, context: &Arc<Context>) -> Result<()> {
        let id = vertex.id();
        if !context.is_local(id) {
            return Err(PregelError::Contract(format!(
                "vertex {} was delivered to worker {} but belongs to worker {}",
                id,
                context.rank(),
                context.owner_of(id)
            )));
        }
        if self.vertices.contains_key(&id) {
            return Err(PregelError::Contract(format!("duplicate vertex id {}", id)));
        }

        vertex.attach(Arc::clone(context));
        self.vertices.insert(id, vertex);
        self.active_vertices.insert(id);
        Ok(())
    }

    /// The generation accumulated last superstep becomes deliverable.
    fn rotate(&mut self) {
        self.cur_messages = std::mem::take(&mut self.next_messages);
    }

    /// Runs compute once on every active vertex. Messages for vertices of
    /// this worker go straight into the next generation, the rest to the
    /// sender pipeline. Returns the number of messages delivered locally.
    fn compute(
        &mut self,
        compute: &dyn Compute<V, E, M>,
        context: &Context,
        outgoing: &Sender<Outgoing<M>>,
    ) -> Result<u64> {
        let mut n_local = 0_u64;
        let mut n_dropped = 0_u64;

        for &id in &self.active_vertices {
            let vertex = self.vertices.get_mut(&id).ok_or_else(|| {
                PregelError::Coordination(format!("active vertex {} is not loaded", id))
            })?;

            let inbox = self.cur_messages.remove(&id).unwrap_or_default();
            vertex.deliver(inbox.into_iter().map(Message::into_value));

            panic::catch_unwind(AssertUnwindSafe(|| compute.compute(vertex))).unwrap_or_else(
                |_| {
                    Err(PregelError::Contract(format!(
                        "compute panicked on vertex {}",
                        id
                    )))
                },
            )?;

            let (halted, sent) = vertex.finish_superstep();
            if halted {
                self.halted_vertices.insert(id);
            }

            for message in sent {
                if !context.is_local(message.receiver) {
                    outgoing.send(Outgoing::Message(message)).map_err(|_| {
                        PregelError::Coordination("send pipeline stopped".into())
                    })?;
                } else if self.vertices.contains_key(&message.receiver) {
                    self.next_messages
                        .entry(message.receiver)
                        .or_default()
                        .push_back(message);
                    n_local += 1;
                } else {
                    n_dropped += 1;
                }
            }
        }

        if n_dropped > 0 {
            warn!(
                "Worker {} dropped {} messages for unknown vertices",
                context.rank(),
                n_dropped
            );
        }

        self.cur_messages.clear();
        Ok(n_local)
    }

    /// Files messages from peers under their receivers and wakes every
    /// halted vertex that has mail.
    fn dispatch(&mut self, rank: usize, incoming: Vec<Message<M>>) {
        let mut n_dropped = 0_u64;
        for message in incoming {
            if self.vertices.contains_key(&message.receiver) {
                self.next_messages
                    .entry(message.receiver)
                    .or_default()
                    .push_back(message);
            } else {
                n_dropped += 1;
            }
        }

        if n_dropped > 0 {
            warn!(
                "Worker {} dropped {} messages for unknown vertices",
                rank, n_dropped
            );
        }

        for id in self.next_messages.keys() {
            self.halted_vertices.remove(id);
        }
    }

    fn refresh_active(&mut self) {
        let halted = &self.halted_vertices;
        self.active_vertices = self
            .vertices
            .keys()
            .filter(|id| !halted.contains(id))
            .copied()
            .collect();

        for (id, vertex) in self.vertices.iter_mut() {
            vertex.set_active(!halted.contains(id));
        }
    }

    fn records(&self, writer: &dyn Writer<V, E, M>) -> Result<Vec<Record>> {
        let mut ids: Vec<_> = self.vertices.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .map(|id| writer.write_vertex(&self.vertices[id]))
            .collect()
    }
}

/// A worker: owns one partition of the graph and runs the superstep loop.
pub(crate) struct Worker<V, E, M> {
    pub id: usize,
    pub n_msg_sent: u64,
    pub n_msg_recv: u64,
    pub time_cost: u128,

    state: State,
    link: WorkerLink<V, E, M>,
    partition: Partition<V, E, M>,
    compute: Arc<dyn Compute<V, E, M>>,
    combiner: Option<Arc<dyn Combine<M>>>,
    writer: Arc<dyn Writer<V, E, M>>,
    message_batch_size: usize,
    channel_capacity: usize,
}

impl<V, E, M> Worker<V, E, M>
where
    V: 'static + Send,
    E: 'static + Send,
    M: 'static + Send + Clone,
{
    pub fn new(
        link: WorkerLink<V, E, M>,
        compute: Arc<dyn Compute<V, E, M>>,
        combiner: Option<Arc<dyn Combine<M>>>,
        writer: Arc<dyn Writer<V, E, M>>,
        config: &Config,
    ) -> Self {
        Worker {
            id: link.rank(),
            n_msg_sent: 0,
            n_msg_recv: 0,
            time_cost: 0,
            state: State::Loading,
            link,
            partition: Partition::new(),
            compute,
            combiner,
            writer,
            message_batch_size: config.message_batch_size,
            channel_capacity: config.channel_capacity,
        }
    }

    pub fn local_n_vertices(&self) -> usize {
        self.partition.vertices.len()
    }

    pub fn local_n_edges(&self) -> usize {
        self.partition
            .vertices
            .values()
            .map(|v| v.out_edges().len())
            .sum()
    }

    /// Runs the worker to completion. Any failure tears down the whole run.
    pub fn run(mut self) -> Result<()> {
        let result = self.work();
        if let Err(err) = &result {
            if !err.is_secondary() {
                warn!("Worker {} failed: {}", self.id, err);
            }
            self.link.abort();
        }
        result
    }

    fn work(&mut self) -> Result<()> {
        let context = self.load()?;

        loop {
            match self.link.recv_control()? {
                Control::Superstep(superstep) => self.superstep(&context, superstep)?,
                Control::Terminate => break,
                _ => {
                    return Err(PregelError::Coordination(format!(
                        "worker {} got an unexpected control packet between supersteps",
                        self.id
                    )))
                }
            }
        }

        self.state.advance(State::Terminated)?;
        self.write()
    }

    fn load(&mut self) -> Result<Arc<Context>> {
        let context = match self.link.recv_control()? {
            Control::Setup {
                num_vertices,
                num_workers,
            } => Arc::new(Context::new(self.id, num_workers, num_vertices)),
            _ => {
                return Err(PregelError::Coordination(format!(
                    "worker {} expected the run setup first",
                    self.id
                )))
            }
        };

        loop {
            match self.link.recv_control()? {
                Control::Partition(batch) => {
                    for vertex in batch {
                        self.partition.add_vertex(vertex, &context)?;
                    }
                }
                Control::EndOfInput => break,
                _ => {
                    return Err(PregelError::Coordination(format!(
                        "worker {} got an unexpected control packet while loading",
                        self.id
                    )))
                }
            }
        }

        debug!(
            "Worker {} loaded {} vertices and {} edges",
            self.id,
            self.local_n_vertices(),
            self.local_n_edges()
        );
        Ok(context)
    }

    fn superstep(&mut self, context: &Arc<Context>, superstep: u64) -> Result<()> {
        let now = Instant::now();
        context.set_superstep(superstep);
        self.state.advance(State::Compute)?;
        self.partition.rotate();

        let rank = self.id;
        let nworkers = context.num_workers();
        let batch_size = self.message_batch_size;
        let link = &self.link;
        let state = &mut self.state;
        let partition = &mut self.partition;
        let compute = self.compute.as_ref();
        let combiner = self.combiner.as_deref();
        let (outgoing, outgoing_rx) = bounded(self.channel_capacity);

        let (n_local, n_remote, incoming) = thread::scope(|scope| {
            let receiver = scope.spawn(|| receive_round(link));
            let sender =
                scope.spawn(move || send_round(link, outgoing_rx, combiner, nworkers, batch_size));

            let computed = compute_and_flush(partition, compute, context, &outgoing);
            drop(outgoing);
            let sent = join(sender, "send");

            let (n_local, n_remote) = match (computed, sent) {
                (Ok(n_local), Ok(n_remote)) => (n_local, n_remote),
                (Err(_), Err(err)) if !err.is_secondary() => return abandon(link, receiver, err),
                (Err(err), _) | (_, Err(err)) => return abandon(link, receiver, err),
            };

            if let Err(err) = state.advance(State::Sending) {
                return abandon(link, receiver, err);
            }
            if let Err(err) = state
                .advance(State::Barrier)
                .and_then(|_| link.barrier())
            {
                return abandon(link, receiver, err);
            }

            if let Err(err) = state
                .advance(State::Receiving)
                .and_then(|_| link.send_data(rank, Data::EndOfRound))
            {
                return abandon(link, receiver, err);
            }
            let incoming = join(receiver, "receive")?;

            Ok((n_local, n_remote, incoming))
        })?;

        let n_received = incoming.len() as u64;
        self.partition.dispatch(rank, incoming);
        self.partition.refresh_active();

        self.state.advance(State::Reducing)?;
        let n_active = self.partition.active_vertices.len() as u64;
        self.n_msg_sent = n_local + n_remote;
        self.n_msg_recv = n_received;
        self.link.report(Report::Active {
            rank,
            active: n_active,
            sent: self.n_msg_sent,
            received: self.n_msg_recv,
        })?;

        self.time_cost = now.elapsed().as_millis();
        debug!(
            "Superstep {}, worker: {}, n_active_vertices: {}, n_vertices: {}, \
                msg_sent: {} ({} local), msg_recv: {}, time_cost: {} ms",
            superstep,
            self.id,
            n_active,
            self.local_n_vertices(),
            self.n_msg_sent,
            n_local,
            self.n_msg_recv,
            self.time_cost
        );
        Ok(())
    }

    fn write(&mut self) -> Result<()> {
        self.state.advance(State::Writing)?;
        let records = self.partition.records(self.writer.as_ref())?;
        self.link.report(Report::Records {
            rank: self.id,
            records,
        })
    }
}

/// Computes every active vertex, then hands the end-of-round marker to the
/// sender pipeline so it flushes and stops.
fn compute_and_flush<V, E, M>(
    partition: &mut Partition<V, E, M>,
    compute: &dyn Compute<V, E, M>,
    context: &Context,
    outgoing: &Sender<Outgoing<M>>,
) -> Result<u64> {
    let n_local = partition.compute(compute, context, outgoing)?;
    outgoing
        .send(Outgoing::EndOfRound)
        .map_err(|_| PregelError::Coordination("send pipeline stopped".into()))?;
    Ok(n_local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::SumCombiner;
    use crate::vertex::Edge;

    fn message(receiver: i64, value: i64) -> Message<i64> {
        Message::new(1, 0, receiver, value)
    }

    #[test]
    fn peer_queue_without_combiner_keeps_everything() {
        let mut queue = PeerQueue::new();
        for value in [5, 3, 4] {
            queue.push(message(2, value), None).unwrap();
        }
        assert_eq!(queue.len(), 3);
        let values: Vec<_> = queue.drain().into_iter().map(|m| m.value).collect();
        assert_eq!(values, vec![5, 3, 4]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn peer_queue_combines_per_receiver() {
        let mut queue = PeerQueue::new();
        queue.push(message(2, 5), Some(&SumCombiner)).unwrap();
        queue.push(message(4, 1), Some(&SumCombiner)).unwrap();
        queue.push(message(2, 3), Some(&SumCombiner)).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain(), vec![message(2, 8), message(4, 1)]);
    }

    fn loaded(ids: &[i64], rank: usize, nworkers: usize) -> (Partition<(), (), i64>, Arc<Context>) {
        let context = Arc::new(Context::new(rank, nworkers, ids.len() as u64));
        let mut partition = Partition::new();
        for &id in ids {
            let edges = vec![Edge::new(id + 1, ())];
            partition.add_vertex(Vertex::new(id, (), edges), &context).unwrap();
        }
        (partition, context)
    }

    #[test]
    fn foreign_and_duplicate_vertices_are_rejected() {
        let (mut partition, context) = loaded(&[0, 2], 1, 2);
        assert!(partition
            .add_vertex(Vertex::new(1, (), vec![]), &context)
            .is_err());
        assert!(partition
            .add_vertex(Vertex::new(2, (), vec![]), &context)
            .is_err());
        assert_eq!(partition.active_vertices.len(), 2);
    }

    #[test]
    fn local_messages_are_deferred_and_remote_ones_forwarded() {
        // Worker 1 of 2 owns the even ids; every vertex messages id + 1.
        let (mut partition, context) = loaded(&[0, 2, 4], 1, 2);
        context.set_superstep(1);
        let (tx, rx) = bounded(16);
        let program = |vertex: &mut Vertex<(), (), i64>| {
            assert!(!vertex.has_message()?);
            vertex.send_message(vertex.id() + 2, 1)?;
            vertex.send_message_to_all_neighbors(10)?;
            vertex.vote_to_halt()
        };

        partition.rotate();
        let n_local = partition.compute(&program, &context, &tx).unwrap();
        // 0 -> 2 and 2 -> 4 stay local, 4 -> 6 names no vertex.
        assert_eq!(n_local, 2);
        assert_eq!(rx.len(), 3);
        assert_eq!(partition.halted_vertices.len(), 3);

        partition.dispatch(1, vec![]);
        partition.refresh_active();
        let active: Vec<_> = partition.active_vertices.iter().copied().collect();
        assert_eq!(active, vec![2, 4]);
        assert!(!partition.vertices[&0].is_active());
        assert!(partition.vertices[&2].is_active());
    }

    #[test]
    fn remote_messages_wake_halted_vertices() {
        let (mut partition, _context) = loaded(&[1, 3], 2, 2);
        partition.halted_vertices.extend([1, 3]);
        partition.active_vertices.clear();

        partition.dispatch(2, vec![message(3, 7), message(99, 1)]);
        partition.refresh_active();
        assert_eq!(partition.active_vertices.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(partition.next_messages[&3].len(), 1);
        assert!(!partition.next_messages.contains_key(&99));
    }

    #[test]
    fn failing_compute_reports_the_vertex() {
        let (mut partition, context) = loaded(&[0], 1, 1);
        let (tx, _rx) = bounded(1);
        let program = |vertex: &mut Vertex<(), (), i64>| vertex.next_message().map(|_| ());
        assert!(matches!(
            partition.compute(&program, &context, &tx),
            Err(PregelError::EmptyInbox { vertex: 0 })
        ));

        let panicking = |_: &mut Vertex<(), (), i64>| -> Result<()> { panic!("boom") };
        assert!(matches!(
            partition.compute(&panicking, &context, &tx),
            Err(PregelError::Contract(_))
        ));
    }
}
