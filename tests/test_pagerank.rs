mod common;

use common::{run, values};
use pregel::apps::pagerank::PageRank;
use pregel::{Edge, Pregel, SumCombiner, ValueWriter, Vertex};

fn graph(adjacency: &[&[i64]]) -> Vec<Vertex<f64, (), f64>> {
    adjacency
        .iter()
        .enumerate()
        .map(|(id, targets)| {
            let edges = targets.iter().map(|&t| Edge::new(t, ())).collect();
            Vertex::new(id as i64, 0.0, edges)
        })
        .collect()
}

fn triangle() -> Vec<Vertex<f64, (), f64>> {
    graph(&[&[1, 2], &[0, 2], &[0, 1]])
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn triangle_first_update() {
    // Every vertex gets half of each neighbour's 1/3.
    let expected = 0.15 / 3.0 + 0.85 * (2.0 * (1.0 / 3.0) / 2.0);

    let mut pregel = Pregel::new(3, PageRank::new(30));
    pregel.set_max_supersteps(Some(2));
    let (summary, records) = run(&pregel, triangle(), ValueWriter).unwrap();

    assert_eq!(summary.supersteps, 2);
    assert!(!summary.converged);
    for value in values(&records) {
        assert_close(value, expected);
    }
}

#[test]
fn triangle_is_stationary() {
    let mut pregel = Pregel::new(2, PageRank::new(5));
    pregel.set_combiner(SumCombiner);
    let (summary, records) = run(&pregel, triangle(), ValueWriter).unwrap();

    // Five updates after the initial superstep, then everyone halts.
    assert_eq!(summary.supersteps, 6);
    assert!(summary.converged);
    let ranks = values(&records);
    assert_eq!(ranks.len(), 3);
    for rank in &ranks {
        assert_close(*rank, 1.0 / 3.0);
    }
}

#[test]
fn ranks_stay_positive_and_sum_to_one() {
    // No dangling vertices, so no rank leaks out of the graph.
    let adjacency: &[&[i64]] = &[&[1, 2, 3], &[2], &[0], &[0, 2], &[3]];

    let mut combined = Pregel::new(3, PageRank::new(20));
    combined.set_combiner(SumCombiner);
    let (_, mut with_combiner) = run(&combined, graph(adjacency), ValueWriter).unwrap();

    let plain = Pregel::new(3, PageRank::new(20));
    let (_, mut without_combiner) = run(&plain, graph(adjacency), ValueWriter).unwrap();

    with_combiner.sort_by_key(|(id, _)| *id);
    without_combiner.sort_by_key(|(id, _)| *id);
    let ranks = values(&with_combiner);
    assert!(ranks.iter().all(|&rank| rank > 0.0));
    assert_close(ranks.iter().sum(), 1.0);

    for (a, b) in ranks.iter().zip(values(&without_combiner)) {
        assert_close(*a, b);
    }
}
