use crate::channel;
use crate::combine::Combine;
use crate::config::Config;
use crate::error::{PregelError, Result};
use crate::io::{Reader, Writer};
use crate::master::{Master, RunSummary};
use crate::vertex::Compute;
use crate::worker::Worker;

use std::io::Write;
use std::sync::Arc;
use std::thread;

/// Sets up and launches runs of a vertex program.
///
/// The master runs on the calling thread; each worker gets a thread of its
/// own. Participants share nothing but the links between them.
pub struct Pregel<V, E, M> {
    config: Config,
    compute: Arc<dyn Compute<V, E, M>>,
    combiner: Option<Arc<dyn Combine<M>>>,
}

impl<V, E, M> Pregel<V, E, M>
where
    V: 'static + Send,
    E: 'static + Send,
    M: 'static + Send + Clone,
{
    pub fn new(nworkers: usize, compute: impl Compute<V, E, M> + 'static) -> Self {
        let config = Config {
            num_workers: nworkers,
            ..Config::default()
        };
        Self::with_config(config, compute)
    }

    pub fn with_config(config: Config, compute: impl Compute<V, E, M> + 'static) -> Self {
        Pregel {
            config,
            compute: Arc::new(compute),
            combiner: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_combiner(&mut self, combiner: impl Combine<M> + 'static) -> &mut Self {
        self.combiner = Some(Arc::new(combiner));
        self
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn set_message_batch_size(&mut self, message_batch_size: usize) -> &mut Self {
        self.config.message_batch_size = message_batch_size;
        self
    }

    pub fn set_channel_capacity(&mut self, channel_capacity: usize) -> &mut Self {
        self.config.channel_capacity = channel_capacity;
        self
    }

    pub fn set_max_supersteps(&mut self, max_supersteps: Option<u64>) -> &mut Self {
        self.config.max_supersteps = max_supersteps;
        self
    }

    /// Loads the graph from `reader`, runs supersteps until every vertex has
    /// halted and writes the final vertices to `sink` through `writer`.
    ///
    /// The first failure of any participant aborts the run; the error
    /// returned is the one that caused the abort.
    pub fn run<R, W, S>(&self, reader: R, writer: W, sink: S) -> Result<RunSummary>
    where
        R: Reader<V, E, M>,
        W: Writer<V, E, M> + 'static,
        S: Write,
    {
        let (master_link, worker_links) =
            channel::create::<V, E, M>(self.config.num_workers, self.config.channel_capacity);
        let writer: Arc<dyn Writer<V, E, M>> = Arc::new(writer);
        let master = Master::new(
            master_link,
            Box::new(reader),
            Arc::clone(&writer),
            Box::new(sink),
            &self.config,
        )?;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(worker_links.len());
            let mut failures = Vec::new();

            for link in worker_links {
                let rank = link.rank();
                let worker = Worker::new(
                    link,
                    Arc::clone(&self.compute),
                    self.combiner.clone(),
                    Arc::clone(&writer),
                    &self.config,
                );
                match thread::Builder::new()
                    .name(format!("pregel-worker-{}", rank))
                    .spawn_scoped(scope, move || worker.run())
                {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        failures.push(PregelError::Io(err));
                        break;
                    }
                }
            }

            if failures.is_empty() {
                match master.run() {
                    Ok(summary) => {
                        for handle in handles {
                            match handle.join() {
                                Ok(Ok(())) => {}
                                Ok(Err(err)) => failures.push(err),
                                Err(_) => failures
                                    .push(PregelError::Coordination("worker panicked".into())),
                            }
                        }
                        if failures.is_empty() {
                            return Ok(summary);
                        }
                    }
                    Err(err) => {
                        failures.push(err);
                        for handle in handles {
                            if let Ok(Err(err)) = handle.join() {
                                failures.push(err);
                            }
                        }
                    }
                }
            } else {
                // Workers already spawned are waiting for a master that
                // will never talk to them.
                master.abort();
                for handle in handles {
                    let _ = handle.join();
                }
            }

            Err(root_cause(failures))
        })
    }
}

/// Picks the error that brought the run down: the first one that is not a
/// mere consequence of another participant aborting.
fn root_cause(mut failures: Vec<PregelError>) -> PregelError {
    match failures.iter().position(|err| !err.is_secondary()) {
        Some(i) => failures.swap_remove(i),
        None => failures.pop().unwrap_or(PregelError::Aborted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_skips_aborts() {
        let failures = vec![
            PregelError::Aborted,
            PregelError::EmptyInbox { vertex: 3 },
            PregelError::Aborted,
        ];
        assert!(matches!(
            root_cause(failures),
            PregelError::EmptyInbox { vertex: 3 }
        ));
        assert!(matches!(
            root_cause(vec![PregelError::Aborted]),
            PregelError::Aborted
        ));
    }
}
