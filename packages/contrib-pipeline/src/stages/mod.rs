//! Stage futures
//!
//! Each stage owns the receiving end of its input channel and the sending
//! end of its output channel. Dropping either one is how a stage tells its
//! neighbours to stop.

pub mod checkpoint;
pub mod enrich;
pub mod produce;
pub mod sink;

pub use checkpoint::{read_checkpoint, write_checkpoint};
pub use enrich::{aggregate, aggregate_one, enrich};
pub use produce::{normalize, produce};
pub use sink::sink;
