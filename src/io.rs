//! The collaborators feeding vertices in and writing results out.

use crate::error::{PregelError, Result};
use crate::vertex::Vertex;

use std::collections::VecDeque;
use std::fmt::Display;
use std::io::Write;

/// A serialized vertex: its id and the text written after it.
pub type Record = (i64, String);

/// Streams the input graph to the master.
///
/// Implementors provide either [`read_vertex`](Reader::read_vertex) or
/// [`read_batch`](Reader::read_batch); a reader providing neither fails with
/// [`PregelError::Unimplemented`] on first use.
pub trait Reader<V, E, M> {
    /// The total number of vertices in the graph.
    fn read_vertex_count(&mut self) -> Result<u64>;

    /// The next vertex, or `None` once the input is exhausted.
    fn read_vertex(&mut self) -> Result<Option<Vertex<V, E, M>>> {
        Err(PregelError::Unimplemented {
            operation: "Reader::read_vertex",
        })
    }

    /// Up to `batch_size` vertices; an empty batch means the input is
    /// exhausted.
    fn read_batch(&mut self, batch_size: usize) -> Result<Vec<Vertex<V, E, M>>> {
        if batch_size == 0 {
            return Err(PregelError::Config("batch size should be positive".into()));
        }

        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.read_vertex()? {
                Some(vertex) => batch.push(vertex),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Turns final vertices into output lines.
///
/// Workers call [`write_vertex`](Writer::write_vertex) on the vertices they
/// own; the master appends the collected records to its sink with
/// [`write_batch`](Writer::write_batch).
pub trait Writer<V, E, M>: Send + Sync {
    fn write_vertex(&self, vertex: &Vertex<V, E, M>) -> Result<Record>;

    fn write_batch(&self, sink: &mut dyn Write, records: &[Record]) -> Result<()> {
        for (id, text) in records {
            writeln!(sink, "{} {}", id, text)?;
        }
        Ok(())
    }
}

/// Writes each vertex as `"<id> <value>"` using the value's `Display`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueWriter;

impl<V: Display, E, M> Writer<V, E, M> for ValueWriter {
    fn write_vertex(&self, vertex: &Vertex<V, E, M>) -> Result<Record> {
        Ok((vertex.id(), vertex.value().to_string()))
    }
}

/// Serves vertices from memory. The vertex count is the number of vertices
/// handed in.
#[derive(Debug)]
pub struct VecReader<V, E, M> {
    count: u64,
    vertices: VecDeque<Vertex<V, E, M>>,
}

impl<V, E, M> VecReader<V, E, M> {
    pub fn new(vertices: Vec<Vertex<V, E, M>>) -> Self {
        VecReader {
            count: vertices.len() as u64,
            vertices: vertices.into(),
        }
    }
}

impl<V, E, M> Reader<V, E, M> for VecReader<V, E, M> {
    fn read_vertex_count(&mut self) -> Result<u64> {
        Ok(self.count)
    }

    fn read_vertex(&mut self) -> Result<Option<Vertex<V, E, M>>> {
        Ok(self.vertices.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountOnly;

    impl Reader<(), (), ()> for CountOnly {
        fn read_vertex_count(&mut self) -> Result<u64> {
            Ok(3)
        }
    }

    #[test]
    fn missing_read_vertex_is_reported() {
        match CountOnly.read_batch(10) {
            Err(PregelError::Unimplemented { operation }) => {
                assert_eq!(operation, "Reader::read_vertex")
            }
            other => panic!("unexpected {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn batches_are_bounded() {
        let vertices = (0..5).map(|id| Vertex::new(id, (), vec![])).collect();
        let mut reader: VecReader<(), (), ()> = VecReader::new(vertices);
        assert_eq!(reader.read_vertex_count().unwrap(), 5);
        assert_eq!(reader.read_batch(2).unwrap().len(), 2);
        assert_eq!(reader.read_batch(2).unwrap().len(), 2);
        assert_eq!(reader.read_batch(2).unwrap().len(), 1);
        assert!(reader.read_batch(2).unwrap().is_empty());
        assert!(matches!(reader.read_batch(0), Err(PregelError::Config(_))));
    }

    #[test]
    fn value_writer_lines() {
        let vertex: Vertex<f64, (), ()> = Vertex::new(7, 2.5, vec![]);
        let record = ValueWriter.write_vertex(&vertex).unwrap();
        assert_eq!(record, (7, "2.5".to_string()));

        let mut out = Vec::new();
        Writer::<f64, (), ()>::write_batch(&ValueWriter, &mut out, &[record, (8, "x".into())])
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "7 2.5\n8 x\n");
    }
}
