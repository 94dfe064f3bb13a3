use crate::partition::partition;

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker execution context.
///
/// One is built by every worker once it knows the shape of the run and is
/// attached to each vertex the worker owns. Only the worker's main loop
/// advances the superstep; vertices only read it.
#[derive(Debug)]
pub struct Context {
    rank: usize,
    num_workers: usize,
    num_vertices: u64,
    superstep: AtomicU64,
}

impl Context {
    pub fn new(rank: usize, num_workers: usize, num_vertices: u64) -> Self {
        Context {
            rank,
            num_workers,
            num_vertices,
            superstep: AtomicU64::new(0),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn num_vertices(&self) -> u64 {
        self.num_vertices
    }

    /// The current superstep; 0 while loading.
    pub fn superstep(&self) -> u64 {
        self.superstep.load(Ordering::Acquire)
    }

    pub(crate) fn set_superstep(&self, superstep: u64) {
        self.superstep.store(superstep, Ordering::Release);
    }

    /// The worker owning `vertex_id`.
    pub fn owner_of(&self, vertex_id: i64) -> usize {
        partition(vertex_id, self.num_workers)
    }

    pub fn is_local(&self, vertex_id: i64) -> bool {
        self.owner_of(vertex_id) == self.rank
    }
}
