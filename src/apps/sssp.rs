use crate::error::Result;
use crate::vertex::{Compute, Vertex};

/// Single-source shortest paths over non-negative `f64` edge weights.
///
/// Vertices unreachable from the source end at `f64::INFINITY`. Every
/// vertex votes to halt each superstep and only wakes up when offered a
/// distance, so the run ends once no distance improves. Offers may be
/// combined with [`MinCombiner`](crate::MinCombiner).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestPaths {
    source: i64,
}

impl ShortestPaths {
    pub fn new(source: i64) -> Self {
        ShortestPaths { source }
    }

    pub fn source(&self) -> i64 {
        self.source
    }

    fn relax(vertex: &mut Vertex<f64, f64, f64>) -> Result<()> {
        let distance = *vertex.value();
        let offers: Vec<_> = vertex
            .out_edges()
            .iter()
            .map(|edge| (edge.target(), distance + edge.value()))
            .collect();
        for (target, offer) in offers {
            vertex.send_message(target, offer)?;
        }
        Ok(())
    }
}

impl Compute<f64, f64, f64> for ShortestPaths {
    fn compute(&self, vertex: &mut Vertex<f64, f64, f64>) -> Result<()> {
        if vertex.superstep()? <= 1 {
            if vertex.id() == self.source {
                vertex.set_value(0.0);
                Self::relax(vertex)?;
            } else {
                vertex.set_value(f64::INFINITY);
            }
        } else {
            let mut best = f64::INFINITY;
            while vertex.has_message()? {
                best = best.min(vertex.next_message()?);
            }
            if best < *vertex.value() {
                vertex.set_value(best);
                Self::relax(vertex)?;
            }
        }

        vertex.vote_to_halt()
    }
}
