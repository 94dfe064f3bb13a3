use crate::error::Result;
use crate::vertex::{Compute, Vertex};

const DAMPING: f64 = 0.85;

/// PageRank over a fixed number of iterations.
///
/// Every vertex starts at `1 / N` in superstep 1 and spreads its rank evenly
/// over its out-edges. From superstep 2 on, a vertex's rank becomes
/// `0.15 / N + 0.85 * sum` of the contributions it received. After
/// `iterations` updates every vertex votes to halt. Contributions may be
/// combined with [`SumCombiner`](crate::SumCombiner).
#[derive(Debug, Clone, Copy)]
pub struct PageRank {
    iterations: u64,
}

impl PageRank {
    pub fn new(iterations: u64) -> Self {
        PageRank { iterations }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl Default for PageRank {
    fn default() -> Self {
        PageRank::new(30)
    }
}

impl<E> Compute<f64, E, f64> for PageRank {
    fn compute(&self, vertex: &mut Vertex<f64, E, f64>) -> Result<()> {
        let superstep = vertex.superstep()?;
        let n = vertex.num_vertices()?.max(1) as f64;

        if superstep <= 1 {
            vertex.set_value(1.0 / n);
        } else {
            let mut sum = 0.0;
            while vertex.has_message()? {
                sum += vertex.next_message()?;
            }
            vertex.set_value((1.0 - DAMPING) / n + DAMPING * sum);
        }

        if superstep > self.iterations {
            return vertex.vote_to_halt();
        }

        let degree = vertex.out_edges().len();
        if degree > 0 {
            let share = *vertex.value() / degree as f64;
            vertex.send_message_to_all_neighbors(share)?;
        }
        Ok(())
    }
}
