//! Concrete sources that sit at the edges of a flowline graph: `Counter`, a
//! periodic emitter, and `sink_to_file`, a scoped sink over a file handle.

pub mod counter;
pub mod error;
pub mod file_sink;

pub use counter::Counter;
pub use error::{Result, SourceError};
pub use file_sink::FileSinkGuard;
