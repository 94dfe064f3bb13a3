//! The links connecting the master and the workers.
//!
//! Every participant owns one endpoint. Control traffic flows from the
//! master to each worker, data traffic between workers, and reports from
//! the workers back to the master. All participants also share a barrier
//! and an abort signal: once any participant fails, every blocked receive
//! and every barrier wait returns [`PregelError::Aborted`] instead of
//! hanging.

use crate::error::{PregelError, Result};
use crate::io::Record;
use crate::message::Message;
use crate::vertex::Vertex;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

/// Master-to-worker traffic.
pub(crate) enum Control<V, E, M> {
    Setup { num_vertices: u64, num_workers: usize },
    Partition(Vec<Vertex<V, E, M>>),
    EndOfInput,
    Superstep(u64),
    Terminate,
}

/// Worker-to-worker traffic.
pub(crate) enum Data<M> {
    Messages(Vec<Message<M>>),
    /// Only ever sent by a worker to itself, to stop its receiver.
    EndOfRound,
}

/// Worker-to-master traffic.
#[derive(Debug)]
pub(crate) enum Report {
    Active {
        rank: usize,
        active: u64,
        sent: u64,
        received: u64,
    },
    Records {
        rank: usize,
        records: Vec<Record>,
    },
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// A reusable barrier that can be torn down while parties wait on it.
struct Barrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl Barrier {
    fn new(parties: usize) -> Self {
        Barrier {
            parties,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.aborted {
            return Err(PregelError::Aborted);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return Ok(());
        }

        while state.generation == generation && !state.aborted {
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.generation != generation {
            Ok(())
        } else {
            Err(PregelError::Aborted)
        }
    }

    fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.aborted = true;
        self.cvar.notify_all();
    }
}

struct Shared {
    barrier: Barrier,
    aborted: AtomicBool,
    // Nothing is ever sent on this channel; dropping the sender disconnects
    // it, which wakes every `select!` watching the receiver.
    abort_tx: Mutex<Option<Sender<()>>>,
    abort_rx: Receiver<()>,
}

impl Shared {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.abort_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.barrier.abort();
    }

    /// A closed link is only a root cause if nobody aborted the run; a
    /// failing participant aborts before its endpoint goes away.
    fn closed(&self, link: &str) -> PregelError {
        if self.aborted.load(Ordering::SeqCst) {
            PregelError::Aborted
        } else {
            PregelError::Coordination(format!("{} link closed", link))
        }
    }

    fn recv<T>(&self, receiver: &Receiver<T>, link: &str) -> Result<T> {
        select! {
            recv(receiver) -> packet => packet.map_err(|_| self.closed(link)),
            recv(self.abort_rx) -> _ => Err(PregelError::Aborted),
        }
    }

    fn send<T>(&self, sender: &Sender<T>, packet: T, link: &str) -> Result<()> {
        select! {
            send(sender, packet) -> res => res.map_err(|_| self.closed(link)),
            recv(self.abort_rx) -> _ => Err(PregelError::Aborted),
        }
    }
}

/// The master's endpoint.
pub(crate) struct MasterLink<V, E, M> {
    controls: Vec<Sender<Control<V, E, M>>>,
    reports: Receiver<Report>,
    shared: Arc<Shared>,
}

impl<V, E, M> MasterLink<V, E, M> {
    pub fn num_workers(&self) -> usize {
        self.controls.len()
    }

    /// Sends `packet` to the worker of rank `rank` (`1..=num_workers`).
    pub fn send(&self, rank: usize, packet: Control<V, E, M>) -> Result<()> {
        let control = self.controls.get(rank.wrapping_sub(1)).ok_or_else(|| {
            PregelError::Coordination(format!("no worker with rank {}", rank))
        })?;
        self.shared.send(control, packet, "control")
    }

    /// Sends a fresh packet built by `make` to every worker, in rank order.
    pub fn broadcast(&self, make: impl Fn() -> Control<V, E, M>) -> Result<()> {
        for control in &self.controls {
            self.shared.send(control, make(), "control")?;
        }
        Ok(())
    }

    pub fn recv_report(&self) -> Result<Report> {
        self.shared.recv(&self.reports, "report")
    }

    pub fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait()
    }

    pub fn abort(&self) {
        self.shared.abort();
    }
}

impl<V, E, M> Drop for MasterLink<V, E, M> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.abort();
        }
    }
}

/// A worker's endpoint.
pub(crate) struct WorkerLink<V, E, M> {
    rank: usize,
    control: Receiver<Control<V, E, M>>,
    data: Receiver<Data<M>>,
    peers: Vec<Sender<Data<M>>>,
    master: Sender<Report>,
    shared: Arc<Shared>,
}

impl<V, E, M> WorkerLink<V, E, M> {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn recv_control(&self) -> Result<Control<V, E, M>> {
        self.shared.recv(&self.control, "control")
    }

    /// Sends `packet` to the worker of rank `rank`, possibly this one.
    pub fn send_data(&self, rank: usize, packet: Data<M>) -> Result<()> {
        let peer = self.peers.get(rank.wrapping_sub(1)).ok_or_else(|| {
            PregelError::Coordination(format!("no worker with rank {}", rank))
        })?;
        self.shared.send(peer, packet, "data")
    }

    pub fn recv_data(&self) -> Result<Data<M>> {
        self.shared.recv(&self.data, "data")
    }

    pub fn report(&self, report: Report) -> Result<()> {
        self.shared.send(&self.master, report, "report")
    }

    pub fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait()
    }

    pub fn abort(&self) {
        self.shared.abort();
    }
}

impl<V, E, M> Drop for WorkerLink<V, E, M> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.abort();
        }
    }
}

/// Builds a fully connected mesh for one master and `nworkers` workers.
///
/// Data links are bounded by `capacity` packets so a fast sender cannot
/// flood a slow receiver; control links are bounded the same way, which
/// caps how many partition batches can be in flight.
pub(crate) fn create<V, E, M>(
    nworkers: usize,
    capacity: usize,
) -> (MasterLink<V, E, M>, Vec<WorkerLink<V, E, M>>) {
    let (abort_tx, abort_rx) = bounded(0);
    let shared = Arc::new(Shared {
        barrier: Barrier::new(nworkers + 1),
        aborted: AtomicBool::new(false),
        abort_tx: Mutex::new(Some(abort_tx)),
        abort_rx,
    });

    let (report_tx, report_rx) = unbounded();

    let mut controls = Vec::with_capacity(nworkers);
    let mut control_rxs = Vec::with_capacity(nworkers);
    let mut peers = Vec::with_capacity(nworkers);
    let mut data_rxs = Vec::with_capacity(nworkers);
    for _ in 0..nworkers {
        let (control_tx, control_rx) = bounded(capacity);
        controls.push(control_tx);
        control_rxs.push(control_rx);

        let (data_tx, data_rx) = bounded(capacity);
        peers.push(data_tx);
        data_rxs.push(data_rx);
    }

    let workers = control_rxs
        .into_iter()
        .zip(data_rxs)
        .enumerate()
        .map(|(i, (control, data))| WorkerLink {
            rank: i + 1,
            control,
            data,
            peers: peers.clone(),
            master: report_tx.clone(),
            shared: Arc::clone(&shared),
        })
        .collect();

    let master = MasterLink {
        controls,
        reports: report_rx,
        shared,
    };

    (master, workers)
}
