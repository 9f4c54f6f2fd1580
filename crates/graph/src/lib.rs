pub mod query;
pub mod writer;

pub use query::{GraphExport, GraphReader, GraphStats, NodeHit};
pub use writer::{GraphWriter, WriteStats};
