use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pregel::apps::pagerank::PageRank;
use pregel::apps::sssp::ShortestPaths;
use pregel::apps::text::{unweighted, weighted, TextReader};
use pregel::{Config, MinCombiner, Pregel, RunSummary, SumCombiner, ValueWriter};

use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Algorithm {
    /// PageRank over unweighted `<id>:<dst> <dst> ...` adjacency lines.
    Pagerank,
    /// Shortest paths over weighted `<id>:<dst>,<weight> ...` adjacency lines.
    Sssp,
}

#[derive(Parser, Debug)]
#[command(version, about = "Runs a vertex program over a graph in supersteps", long_about = None)]
struct CliArgs {
    /// File whose first line is the number of vertices.
    config: PathBuf,

    /// The adjacency list, one vertex per line.
    graph: PathBuf,

    /// Where to write one `<id> <value>` line per vertex.
    output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Algorithm::Pagerank)]
    algorithm: Algorithm,

    /// Number of worker threads.
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Vertices partitioned per loading round.
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Messages buffered per peer before they are shipped.
    #[arg(long, default_value_t = 1024)]
    message_batch_size: usize,

    /// Stop after this many supersteps even if vertices are still active.
    #[arg(long)]
    max_supersteps: Option<u64>,

    /// PageRank iterations.
    #[arg(short, long, default_value_t = 30)]
    iterations: u64,

    /// SSSP source vertex.
    #[arg(short, long, default_value_t = 0)]
    source: i64,

    /// Ship every message as is.
    #[arg(long)]
    no_combiner: bool,
}

impl CliArgs {
    fn config(&self) -> Config {
        Config {
            num_workers: self.workers,
            batch_size: self.batch_size,
            message_batch_size: self.message_batch_size,
            max_supersteps: self.max_supersteps,
            ..Config::default()
        }
    }
}

fn pagerank(args: &CliArgs, sink: impl Write) -> Result<RunSummary> {
    let reader = TextReader::open(&args.config, &args.graph, unweighted())
        .with_context(|| format!("Could not open {}", args.graph.display()))?;
    let mut pregel: Pregel<f64, (), f64> =
        Pregel::with_config(args.config(), PageRank::new(args.iterations));
    if !args.no_combiner {
        pregel.set_combiner(SumCombiner);
    }
    Ok(pregel.run(reader, ValueWriter, sink)?)
}

fn sssp(args: &CliArgs, sink: impl Write) -> Result<RunSummary> {
    let reader = TextReader::open(&args.config, &args.graph, weighted())
        .with_context(|| format!("Could not open {}", args.graph.display()))?;
    let mut pregel: Pregel<f64, f64, f64> =
        Pregel::with_config(args.config(), ShortestPaths::new(args.source));
    if !args.no_combiner {
        pregel.set_combiner(MinCombiner);
    }
    Ok(pregel.run(reader, ValueWriter, sink)?)
}

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{style}{}{style:#} [{}] {} - {}",
                record.level(),
                std::thread::current().name().unwrap_or("main"),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = CliArgs::parse();
    let sink = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Could not create {}", args.output.display()))?,
    );

    let summary = match args.algorithm {
        Algorithm::Pagerank => pagerank(&args, sink),
        Algorithm::Sssp => sssp(&args, sink),
    }
    .with_context(|| format!("{:?} failed on {}", args.algorithm, args.graph.display()))?;

    info!(
        "{} supersteps over {} vertices{}, results in {}",
        summary.supersteps,
        summary.num_vertices,
        if summary.converged {
            ""
        } else {
            " (stopped at the superstep limit)"
        },
        args.output.display()
    );
    Ok(())
}
