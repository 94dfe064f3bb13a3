use pregel::apps::sssp::ShortestPaths;
use pregel::apps::text::{weighted, TextReader};
use pregel::{Edge, MinCombiner, Pregel, ValueWriter, VecReader, Vertex};

use rand::prelude::*;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter};

const NUM_VERTICES: i64 = 100_000;
const MAX_OUT_DEGREE: usize = 20;

fn random_graph(rng: &mut impl Rng) -> Vec<Vertex<f64, f64, f64>> {
    (0..NUM_VERTICES)
        .map(|id| {
            let degree = rng.gen_range(0..=MAX_OUT_DEGREE);
            let edges = (0..degree)
                .map(|_| (rng.gen_range(0..NUM_VERTICES), rng.gen_range(0..100)))
                .filter(|&(target, _)| target != id)
                .map(|(target, weight)| Edge::new(target, weight as f64))
                .collect();
            Vertex::new(id, 0.0, edges)
        })
        .collect()
}

/// Usage: `sssp [CONFIG GRAPH]`. Without arguments a random graph is used.
/// Distances go to `sssp.out`.
fn main() -> pregel::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut pregel = Pregel::new(8, ShortestPaths::new(0));
    pregel.set_combiner(MinCombiner);
    let sink = BufWriter::new(File::create("sssp.out")?);

    let args: Vec<String> = env::args().skip(1).collect();
    let summary = match args.as_slice() {
        [config, graph] => {
            let reader = TextReader::open(config, graph, weighted())?;
            pregel.run(reader, ValueWriter, sink)?
        }
        [] => {
            let vertices = random_graph(&mut StdRng::seed_from_u64(0));
            pregel.run(VecReader::new(vertices), ValueWriter, sink)?
        }
        _ => {
            let usage = io::Error::new(io::ErrorKind::InvalidInput, "usage: sssp [CONFIG GRAPH]");
            return Err(usage.into());
        }
    };

    println!(
        "Distances of {} vertices written to sssp.out after {} supersteps",
        summary.num_vertices, summary.supersteps
    );
    Ok(())
}
