//! Wire protocol decoders.
//!
//! Two formats can arrive on the same byte stream:
//!
//! - [`nmea`] - AIS NMEA 0183 text sentences (`!AIVDM`, `!AIVDO`)
//! - [`mavlink`] - MAVLink v1/v2 binary frames carrying `AIS_VESSEL`
//!
//! The ingest layer talks to both through the [`SentenceDecoder`] and
//! [`FrameDecoder`] traits so a connection can be driven by alternate
//! implementations in tests.

use std::net::SocketAddr;

pub mod mavlink;
pub mod nmea;

pub use mavlink::{AisVessel, Heartbeat, MavlinkMessage, MavlinkParser, ParserStats};
pub use nmea::{AisBody, AisDecoder, AisMessage, DecodeError, PositionFields};

/// Decoder for text sentences.
pub trait SentenceDecoder: Send {
    /// Decode one sentence received from `source`.
    ///
    /// Returns `Ok(None)` when the sentence was accepted as a fragment of a
    /// multi-sentence message that is not complete yet. Fragments are only
    /// combined with fragments from the same source.
    fn decode(
        &mut self,
        source: SocketAddr,
        sentence: &str,
    ) -> Result<Option<AisMessage>, DecodeError>;
}

/// Incremental decoder for binary frames.
///
/// Never fails: malformed frames are forfeited and the decoder resynchronizes
/// on the next start marker.
pub trait FrameDecoder: Send {
    /// Feed one byte, returning a message when it completes a valid frame.
    fn feed(&mut self, byte: u8) -> Option<MavlinkMessage>;

    /// Drop any partially received frame.
    fn reset(&mut self);
}
