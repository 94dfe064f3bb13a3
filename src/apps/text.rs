//! The plain-text graph format.
//!
//! A graph comes as two files. The config file holds the vertex count on
//! its first line. The graph file holds one vertex per line:
//!
//! ```text
//! <id>:<dst>[,<weight>] <dst>[,<weight>] ...
//! ```
//!
//! A vertex without out-edges is written `<id>:`. Blank lines are skipped.

use crate::error::{PregelError, Result};
use crate::io::Reader;
use crate::vertex::{Edge, Vertex};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Turns the optional `,<weight>` part of an edge into an edge value.
pub type EdgeParser<E> = Box<dyn Fn(Option<&str>) -> std::result::Result<E, String>>;

/// Edges without values. A weight, if present, is ignored.
pub fn unweighted() -> EdgeParser<()> {
    Box::new(|_| Ok(()))
}

/// Edges that must carry a weight.
pub fn weighted<E>() -> EdgeParser<E>
where
    E: FromStr,
    E::Err: std::fmt::Display,
{
    Box::new(|weight| match weight {
        Some(weight) => weight
            .parse()
            .map_err(|err| format!("bad edge weight {:?}: {}", weight, err)),
        None => Err("edge has no weight".to_string()),
    })
}

/// Reads the text format. Vertices start with `V::default()` as value.
pub struct TextReader<C, G, E> {
    config: C,
    graph: G,
    line_no: usize,
    line: String,
    edge_parser: EdgeParser<E>,
}

impl<E> TextReader<BufReader<File>, BufReader<File>, E> {
    pub fn open(
        config: impl AsRef<Path>,
        graph: impl AsRef<Path>,
        edge_parser: EdgeParser<E>,
    ) -> Result<Self> {
        let config = BufReader::new(File::open(config)?);
        let graph = BufReader::new(File::open(graph)?);
        Ok(TextReader::new(config, graph, edge_parser))
    }
}

impl<C: BufRead, G: BufRead, E> TextReader<C, G, E> {
    pub fn new(config: C, graph: G, edge_parser: EdgeParser<E>) -> Self {
        TextReader {
            config,
            graph,
            line_no: 0,
            line: String::new(),
            edge_parser,
        }
    }

    fn parse_edge(&self, token: &str) -> Result<Edge<E>> {
        let (target, weight) = match token.split_once(',') {
            Some((target, weight)) => (target, Some(weight)),
            None => (token, None),
        };
        let target = target.parse().map_err(|_| PregelError::Parse {
            line: self.line_no,
            reason: format!("bad edge target {:?}", target),
        })?;
        let value = (self.edge_parser)(weight).map_err(|reason| PregelError::Parse {
            line: self.line_no,
            reason,
        })?;
        Ok(Edge::new(target, value))
    }

    fn parse_vertex<V: Default, M>(&self, line: &str) -> Result<Vertex<V, E, M>> {
        let (id, edges) = line.split_once(':').ok_or_else(|| PregelError::Parse {
            line: self.line_no,
            reason: "missing ':' after the vertex id".into(),
        })?;
        let id = id.trim().parse().map_err(|_| PregelError::Parse {
            line: self.line_no,
            reason: format!("bad vertex id {:?}", id.trim()),
        })?;
        let edges = edges
            .split_whitespace()
            .map(|token| self.parse_edge(token))
            .collect::<Result<Vec<_>>>()?;
        Ok(Vertex::new(id, V::default(), edges))
    }
}

impl<C, G, V, E, M> Reader<V, E, M> for TextReader<C, G, E>
where
    C: BufRead,
    G: BufRead,
    V: Default,
{
    fn read_vertex_count(&mut self) -> Result<u64> {
        let mut line = String::new();
        self.config.read_line(&mut line)?;
        line.trim().parse().map_err(|_| PregelError::Parse {
            line: 1,
            reason: format!("bad vertex count {:?} in the config file", line.trim()),
        })
    }

    fn read_vertex(&mut self) -> Result<Option<Vertex<V, E, M>>> {
        loop {
            self.line.clear();
            if self.graph.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line.trim();
            if !line.is_empty() {
                return self.parse_vertex(line).map(Some);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted_reader(graph: &'static str) -> TextReader<&'static [u8], &'static [u8], f64> {
        TextReader::new(&b"3\n"[..], graph.as_bytes(), weighted())
    }

    #[test]
    fn reads_weighted_graph() {
        let mut reader = weighted_reader("0:1,2 2,4.5\n\n1:\n2:0,1\n");
        assert_eq!(Reader::<f64, f64, f64>::read_vertex_count(&mut reader).unwrap(), 3);

        let batch: Vec<Vertex<f64, f64, f64>> = reader.read_batch(10).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].id(), 0);
        assert_eq!(
            batch[0].out_edges(),
            &[Edge::new(1, 2.0), Edge::new(2, 4.5)][..]
        );
        assert!(batch[1].out_edges().is_empty());
        assert_eq!(batch[2].id(), 2);
    }

    #[test]
    fn unweighted_edges() {
        let mut reader = TextReader::new(&b"2"[..], &b"0:1 \n1:0\n"[..], unweighted());
        let batch: Vec<Vertex<f64, (), f64>> = reader.read_batch(1).unwrap();
        assert_eq!(batch[0].out_edges(), &[Edge::new(1, ())][..]);
    }

    #[test]
    fn errors_name_the_line() {
        let mut reader = weighted_reader("0:1,1\n1:2\n");
        let err = Reader::<f64, f64, f64>::read_batch(&mut reader, 10).unwrap_err();
        assert!(matches!(err, PregelError::Parse { line: 2, .. }), "{}", err);

        let mut reader = weighted_reader("x:1,1\n");
        let err = Reader::<f64, f64, f64>::read_batch(&mut reader, 10).unwrap_err();
        assert!(matches!(err, PregelError::Parse { line: 1, .. }));

        let mut reader = TextReader::new(&b"many\n"[..], &b""[..], unweighted());
        assert!(matches!(
            Reader::<f64, (), f64>::read_vertex_count(&mut reader),
            Err(PregelError::Parse { line: 1, .. })
        ));
    }
}
