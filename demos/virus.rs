use pregel::{Edge, Pregel, Record, Result, VecReader, Vertex, Writer};

use rand::prelude::*;
use std::io::Write;

const NUM_VERTICES: i64 = 50_000;
const MAX_OUT_DEGREE: usize = 4;
const PATIENTS_ZERO: f64 = 0.0001;

/// Infected vertices pass the virus to their neighbours once and go quiet.
/// Vertex 0 and a few random ones start out infected.
fn compute(vertex: &mut Vertex<bool, (), bool>) -> Result<()> {
    let exposed = vertex.has_message()?;
    if !*vertex.value() {
        let patient_zero = vertex.superstep()? == 1
            && (vertex.id() == 0 || rand::thread_rng().gen::<f64>() < PATIENTS_ZERO);
        if exposed || patient_zero {
            vertex.set_value(true);
            vertex.send_message_to_all_neighbors(true)?;
        }
    }
    vertex.vote_to_halt()
}

/// Keeps only infected vertices' ids.
struct InfectedWriter;

impl Writer<bool, (), bool> for InfectedWriter {
    fn write_vertex(&self, vertex: &Vertex<bool, (), bool>) -> Result<Record> {
        Ok((vertex.id(), vertex.value().to_string()))
    }

    fn write_batch(&self, sink: &mut dyn Write, records: &[Record]) -> Result<()> {
        for (id, infected) in records {
            if infected == "true" {
                writeln!(sink, "{}", id)?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(42);
    let vertices = (0..NUM_VERTICES)
        .map(|id| {
            let degree = rng.gen_range(0..=MAX_OUT_DEGREE);
            let edges = (0..degree)
                .map(|_| Edge::new(rng.gen_range(0..NUM_VERTICES), ()))
                .collect();
            Vertex::new(id, false, edges)
        })
        .collect();

    let mut pregel = Pregel::new(8, compute);
    pregel.set_combiner(|_: bool, _: bool| true);

    let mut out = Vec::new();
    let summary = pregel.run(VecReader::new(vertices), InfectedWriter, &mut out)?;
    let infected = out.iter().filter(|&&b| b == b'\n').count();
    println!(
        "{} of {} vertices infected after {} supersteps",
        infected, NUM_VERTICES, summary.supersteps
    );
    Ok(())
}
