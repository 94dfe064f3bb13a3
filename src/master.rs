use crate::channel::{Control, MasterLink, Report};
use crate::config::Config;
use crate::error::{PregelError, Result};
use crate::io::{Reader, Record, Writer};
use crate::partition::partition;
use crate::vertex::Vertex;

use log::{info, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Supersteps executed.
    pub supersteps: u64,
    /// Vertex count announced by the reader.
    pub num_vertices: u64,
    /// Messages sent over the whole run, after combining.
    pub messages_sent: u64,
    /// Whether the run ended because every vertex halted, as opposed to
    /// hitting the superstep limit.
    pub converged: bool,
    pub elapsed: Duration,
}

/// Totals of one sum-reduction round.
#[derive(Debug, Default)]
struct RoundStats {
    active: u64,
    sent: u64,
    received: u64,
}

/// The coordinator: partitions the input, detects termination and
/// collects the output.
pub(crate) struct Master<'a, V, E, M> {
    nworkers: usize,
    superstep: u64,
    num_vertices: u64,
    num_active_vertices: u64,
    messages_sent: u64,
    batch_size: usize,
    max_supersteps: Option<u64>,
    link: MasterLink<V, E, M>,
    reader: Box<dyn Reader<V, E, M> + 'a>,
    writer: Arc<dyn Writer<V, E, M>>,
    sink: Box<dyn Write + 'a>,
}

impl<'a, V, E, M> Master<'a, V, E, M> {
    pub fn new(
        link: MasterLink<V, E, M>,
        reader: Box<dyn Reader<V, E, M> + 'a>,
        writer: Arc<dyn Writer<V, E, M>>,
        sink: Box<dyn Write + 'a>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        if link.num_workers() != config.num_workers {
            return Err(PregelError::Config(format!(
                "configured for {} workers but connected to {}",
                config.num_workers,
                link.num_workers()
            )));
        }

        Ok(Master {
            nworkers: config.num_workers,
            superstep: 0,
            num_vertices: 0,
            num_active_vertices: 0,
            messages_sent: 0,
            batch_size: config.batch_size,
            max_supersteps: config.max_supersteps,
            link,
            reader,
            writer,
            sink,
        })
    }

    /// Tears down the run without starting it.
    pub fn abort(&self) {
        self.link.abort();
    }

    /// Runs the whole protocol on the calling thread. Any failure tears
    /// down the run.
    pub fn run(mut self) -> Result<RunSummary> {
        let result = self.coordinate();
        if let Err(err) = &result {
            if !err.is_secondary() {
                warn!("Master failed: {}", err);
            }
            self.link.abort();
        }
        result
    }

    fn coordinate(&mut self) -> Result<RunSummary> {
        let now = Instant::now();

        let loaded = self.load()?;
        let converged = self.run_supersteps(loaded)?;
        self.collect()?;

        let summary = RunSummary {
            supersteps: self.superstep.saturating_sub(1),
            num_vertices: self.num_vertices,
            messages_sent: self.messages_sent,
            converged,
            elapsed: now.elapsed(),
        };
        info!(
            "Finished after {} supersteps, {} messages, total time cost: {} ms",
            summary.supersteps,
            summary.messages_sent,
            summary.elapsed.as_millis()
        );
        Ok(summary)
    }

    fn check_vertex(vertex: &Vertex<V, E, M>) -> Result<()> {
        if vertex.id() < 0 {
            return Err(PregelError::Contract(format!(
                "vertex id {} is negative",
                vertex.id()
            )));
        }
        if let Some(edge) = vertex.out_edges().iter().find(|e| e.target() < 0) {
            return Err(PregelError::Contract(format!(
                "vertex {} has an edge to negative id {}",
                vertex.id(),
                edge.target()
            )));
        }
        Ok(())
    }

    /// Streams the graph to its owners, one bounded batch at a time.
    /// Returns how many vertices were delivered.
    fn load(&mut self) -> Result<u64> {
        let now = Instant::now();
        let num_vertices = self.reader.read_vertex_count()?;
        let num_workers = self.nworkers;
        self.num_vertices = num_vertices;
        self.link.broadcast(|| Control::Setup {
            num_vertices,
            num_workers,
        })?;

        let mut loaded = 0_u64;
        loop {
            let batch = self.reader.read_batch(self.batch_size)?;
            if batch.is_empty() {
                break;
            }

            let mut parts: Vec<Vec<Vertex<V, E, M>>> =
                (0..self.nworkers).map(|_| Vec::new()).collect();
            for vertex in batch {
                Self::check_vertex(&vertex)?;
                parts[partition(vertex.id(), self.nworkers) - 1].push(vertex);
                loaded += 1;
            }

            for (i, part) in parts.into_iter().enumerate() {
                if !part.is_empty() {
                    self.link.send(i + 1, Control::Partition(part))?;
                }
            }
        }
        self.link.broadcast(|| Control::EndOfInput)?;

        if loaded != num_vertices {
            warn!(
                "The reader announced {} vertices but produced {}",
                num_vertices, loaded
            );
        }
        info!(
            "Loaded {} vertices on {} workers in {} ms",
            loaded,
            self.nworkers,
            now.elapsed().as_millis()
        );
        Ok(loaded)
    }

    /// Collects one active-count report from every worker.
    fn reduce(&mut self) -> Result<RoundStats> {
        let mut reported = vec![false; self.nworkers];
        let mut stats = RoundStats::default();

        for _ in 0..self.nworkers {
            match self.link.recv_report()? {
                Report::Active {
                    rank,
                    active,
                    sent,
                    received,
                } => {
                    match reported.get_mut(rank.wrapping_sub(1)) {
                        Some(seen) if !*seen => *seen = true,
                        _ => {
                            return Err(PregelError::Coordination(format!(
                                "unexpected active count from worker {} in superstep {}",
                                rank, self.superstep
                            )))
                        }
                    }
                    stats.active += active;
                    stats.sent += sent;
                    stats.received += received;
                }
                Report::Records { rank, .. } => {
                    return Err(PregelError::Coordination(format!(
                        "worker {} sent results during superstep {}",
                        rank, self.superstep
                    )))
                }
            }
        }

        Ok(stats)
    }

    /// Runs supersteps until no vertex is active. Returns `false` if the
    /// superstep limit stopped the run first.
    fn run_supersteps(&mut self, loaded: u64) -> Result<bool> {
        self.superstep = 1;
        self.num_active_vertices = loaded;

        let mut converged = true;
        while self.num_active_vertices > 0 {
            if let Some(max) = self.max_supersteps {
                if self.superstep > max {
                    warn!(
                        "Stopping at the limit of {} supersteps with {} active vertices",
                        max, self.num_active_vertices
                    );
                    converged = false;
                    break;
                }
            }

            let now = Instant::now();
            let superstep = self.superstep;
            self.link.broadcast(|| Control::Superstep(superstep))?;
            self.link.barrier()?;

            let stats = self.reduce()?;
            self.num_active_vertices = stats.active;
            self.messages_sent += stats.sent;
            info!(
                "Superstep: {}, n_active_vertices: {}, msg_sent: {}, msg_recv: {}, time_cost: {} ms",
                superstep,
                stats.active,
                stats.sent,
                stats.received,
                now.elapsed().as_millis()
            );

            self.superstep += 1;
        }

        self.link.broadcast(|| Control::Terminate)?;
        Ok(converged)
    }

    /// Gathers every worker's records and writes them in rank order.
    fn collect(&mut self) -> Result<()> {
        let mut batches: Vec<Option<Vec<Record>>> = (0..self.nworkers).map(|_| None).collect();

        for _ in 0..self.nworkers {
            match self.link.recv_report()? {
                Report::Records { rank, records } => {
                    let slot = batches
                        .get_mut(rank.wrapping_sub(1))
                        .filter(|slot| slot.is_none())
                        .ok_or_else(|| {
                            PregelError::Coordination(format!(
                                "unexpected results from worker {}",
                                rank
                            ))
                        })?;
                    *slot = Some(records);
                }
                Report::Active { rank, .. } => {
                    return Err(PregelError::Coordination(format!(
                        "worker {} reported an active count after termination",
                        rank
                    )))
                }
            }
        }

        for records in batches.into_iter().flatten() {
            self.writer.write_batch(&mut self.sink, &records)?;
        }
        self.sink.flush()?;
        Ok(())
    }
}
