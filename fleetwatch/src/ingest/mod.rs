//! Ingestion: framing and demultiplexing of raw socket bytes.
//!
//! - [`splitter`] - `FrameSplitter`, stream bytes to sentence / binary units
//! - [`dispatch`] - `Dispatcher`, units to decoders to the aggregator

pub mod dispatch;
pub mod splitter;

pub use dispatch::{DispatchStats, Dispatcher};
pub use splitter::{FrameError, FrameSplitter, FrameUnit, DEFAULT_MAX_BUFFER_SIZE};
