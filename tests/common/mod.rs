#![allow(dead_code)]

use pregel::{Pregel, Record, RunSummary, VecReader, Vertex, Writer};
use std::fmt::Debug;

/// Writes each vertex value with its `Debug` form.
pub struct DebugWriter;

impl<V: Debug, E, M> Writer<V, E, M> for DebugWriter {
    fn write_vertex(&self, vertex: &Vertex<V, E, M>) -> pregel::Result<Record> {
        Ok((vertex.id(), format!("{:?}", vertex.value())))
    }
}

pub fn parse_output(out: Vec<u8>) -> Vec<(i64, String)> {
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| {
            let (id, value) = line.split_once(' ').unwrap();
            (id.parse().unwrap(), value.to_string())
        })
        .collect()
}

/// Runs `pregel` over `vertices` and returns the summary with the records
/// in output order.
pub fn run<V, E, M, W>(
    pregel: &Pregel<V, E, M>,
    vertices: Vec<Vertex<V, E, M>>,
    writer: W,
) -> pregel::Result<(RunSummary, Vec<(i64, String)>)>
where
    V: 'static + Send,
    E: 'static + Send,
    M: 'static + Send + Clone,
    W: Writer<V, E, M> + 'static,
{
    let mut out = Vec::new();
    let summary = pregel.run(VecReader::new(vertices), writer, &mut out)?;
    Ok((summary, parse_output(out)))
}

pub fn values(records: &[(i64, String)]) -> Vec<f64> {
    records.iter().map(|(_, value)| value.parse().unwrap()).collect()
}
