use pregel::apps::pagerank::PageRank;
use pregel::{Edge, Pregel, SumCombiner, ValueWriter, VecReader, Vertex};

use rand::prelude::*;
use std::io;

const NUM_VERTICES: i64 = 10_000;
const MAX_OUT_DEGREE: usize = 20;

fn random_graph(rng: &mut impl Rng) -> Vec<Vertex<f64, (), f64>> {
    (0..NUM_VERTICES)
        .map(|id| {
            let degree = rng.gen_range(1..=MAX_OUT_DEGREE);
            let edges = (0..degree)
                .map(|_| rng.gen_range(0..NUM_VERTICES))
                .filter(|&target| target != id)
                .map(|target| Edge::new(target, ()))
                .collect();
            Vertex::new(id, 0.0, edges)
        })
        .collect()
}

fn main() -> pregel::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let vertices = random_graph(&mut StdRng::seed_from_u64(0));
    let mut pregel = Pregel::new(8, PageRank::new(30));
    pregel.set_combiner(SumCombiner);

    let mut out = Vec::new();
    let summary = pregel.run(VecReader::new(vertices), ValueWriter, &mut out)?;

    let text = String::from_utf8_lossy(&out);
    let (id, rank) = text
        .lines()
        .filter_map(|line| line.split_once(' '))
        .filter_map(|(id, rank)| Some((id.to_owned(), rank.parse::<f64>().ok()?)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| io::Error::other("no ranks were written"))?;
    println!(
        "Max vertex: {}, weight: {} ({} supersteps, {} ms)",
        id,
        rank,
        summary.supersteps,
        summary.elapsed.as_millis()
    );
    Ok(())
}
