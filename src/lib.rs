mod channel;
mod worker;

pub mod apps;

mod combine;
pub use combine::*;

mod config;
pub use config::*;

mod context;
pub use context::*;

mod error;
pub use error::*;

mod io;
pub use io::*;

mod master;
pub use master::RunSummary;

mod message;
pub use message::*;

mod partition;
pub use partition::*;

mod pregel;
pub use pregel::*;

mod state;
pub use state::*;

mod vertex;
pub use vertex::*;
