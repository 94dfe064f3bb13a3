//! Ready-made vertex programs and the text graph format they read.

pub mod pagerank;
pub mod sssp;
pub mod text;
