//! MAVLink v1/v2 frame parser.
//!
//! Frames are recognized incrementally, one byte at a time:
//!
//! ```text
//! v1: FE len seq sys comp msgid                      payload crc_lo crc_hi
//! v2: FD len incompat compat seq sys comp msgid[3]   payload crc_lo crc_hi [signature(13)]
//! ```
//!
//! The checksum is CRC-16/MCRF4XX (X.25) over everything after the start
//! marker, followed by the message's CRC_EXTRA seed byte. Only messages with a
//! known CRC_EXTRA can be validated, so frames with other ids are dropped.
//!
//! MAVLink 2 senders truncate trailing zero bytes of the payload; payloads are
//! zero-extended back to their full length before decoding.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use super::FrameDecoder;

/// MAVLink v1 start marker.
pub const STX_V1: u8 = 0xFE;

/// MAVLink v2 start marker.
pub const STX_V2: u8 = 0xFD;

const HEADER_LEN_V1: usize = 6;
const HEADER_LEN_V2: usize = 10;
const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// `HEARTBEAT` message id.
pub const HEARTBEAT_ID: u32 = 0;
const HEARTBEAT_CRC_EXTRA: u8 = 50;
const HEARTBEAT_LEN: usize = 9;

/// `AIS_VESSEL` message id.
pub const AIS_VESSEL_ID: u32 = 301;
const AIS_VESSEL_CRC_EXTRA: u8 = 243;
const AIS_VESSEL_LEN: usize = 58;

/// `HEARTBEAT` (id 0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

/// `AIS_VESSEL` (id 301), in MAVLink wire units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AisVessel {
    pub mmsi: u32,
    /// Latitude in degE7.
    pub lat: i32,
    /// Longitude in degE7.
    pub lon: i32,
    /// Course over ground in cdeg (65535 = unknown).
    pub cog: u16,
    /// True heading in cdeg (65535 = unknown).
    pub heading: u16,
    /// Speed over ground in cm/s (65535 = unknown).
    pub velocity: u16,
    pub dimension_bow: u16,
    pub dimension_stern: u16,
    /// Time since last communication, seconds.
    pub tslc: u16,
    pub flags: u16,
    pub turn_rate: i8,
    pub navigational_status: u8,
    pub vessel_type: u8,
    pub dimension_port: u8,
    pub dimension_starboard: u8,
    pub callsign: String,
    pub name: String,
}

/// A decoded MAVLink message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MavlinkMessage {
    Heartbeat(Heartbeat),
    AisVessel(AisVessel),
}

impl MavlinkMessage {
    /// Message id on the wire.
    pub fn id(&self) -> u32 {
        match self {
            MavlinkMessage::Heartbeat(_) => HEARTBEAT_ID,
            MavlinkMessage::AisVessel(_) => AIS_VESSEL_ID,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            MavlinkMessage::Heartbeat(hb) => hb.encode_payload().to_vec(),
            MavlinkMessage::AisVessel(vessel) => vessel.encode_payload().to_vec(),
        }
    }
}

impl Heartbeat {
    fn decode(p: &[u8]) -> Self {
        Self {
            custom_mode: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
            mav_type: p[4],
            autopilot: p[5],
            base_mode: p[6],
            system_status: p[7],
            mavlink_version: p[8],
        }
    }

    /// Serialize to the wire payload.
    pub fn encode_payload(&self) -> [u8; HEARTBEAT_LEN] {
        let mut out = [0u8; HEARTBEAT_LEN];
        out[0..4].copy_from_slice(&self.custom_mode.to_le_bytes());
        out[4] = self.mav_type;
        out[5] = self.autopilot;
        out[6] = self.base_mode;
        out[7] = self.system_status;
        out[8] = self.mavlink_version;
        out
    }
}

impl AisVessel {
    fn decode(p: &[u8]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([p[i], p[i + 1]]);
        let i32_at = |i: usize| i32::from_le_bytes([p[i], p[i + 1], p[i + 2], p[i + 3]]);

        Self {
            mmsi: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
            lat: i32_at(4),
            lon: i32_at(8),
            cog: u16_at(12),
            heading: u16_at(14),
            velocity: u16_at(16),
            dimension_bow: u16_at(18),
            dimension_stern: u16_at(20),
            tslc: u16_at(22),
            flags: u16_at(24),
            turn_rate: p[26] as i8,
            navigational_status: p[27],
            vessel_type: p[28],
            dimension_port: p[29],
            dimension_starboard: p[30],
            callsign: fixed_str(&p[31..38]),
            name: fixed_str(&p[38..58]),
        }
    }

    /// Serialize to the wire payload (fields ordered by size, as MAVLink requires).
    pub fn encode_payload(&self) -> [u8; AIS_VESSEL_LEN] {
        let mut buf = BytesMut::with_capacity(AIS_VESSEL_LEN);
        buf.put_u32_le(self.mmsi);
        buf.put_i32_le(self.lat);
        buf.put_i32_le(self.lon);
        buf.put_u16_le(self.cog);
        buf.put_u16_le(self.heading);
        buf.put_u16_le(self.velocity);
        buf.put_u16_le(self.dimension_bow);
        buf.put_u16_le(self.dimension_stern);
        buf.put_u16_le(self.tslc);
        buf.put_u16_le(self.flags);
        buf.put_i8(self.turn_rate);
        buf.put_u8(self.navigational_status);
        buf.put_u8(self.vessel_type);
        buf.put_u8(self.dimension_port);
        buf.put_u8(self.dimension_starboard);
        put_fixed_str(&mut buf, &self.callsign, 7);
        put_fixed_str(&mut buf, &self.name, 20);

        let mut out = [0u8; AIS_VESSEL_LEN];
        out.copy_from_slice(&buf);
        out
    }
}

/// Read a NUL-padded fixed-width string field.
fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn put_fixed_str(buf: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, width - len);
}

/// CRC_EXTRA seed and full payload length for a known message id.
fn message_info(id: u32) -> Option<(u8, usize)> {
    match id {
        HEARTBEAT_ID => Some((HEARTBEAT_CRC_EXTRA, HEARTBEAT_LEN)),
        AIS_VESSEL_ID => Some((AIS_VESSEL_CRC_EXTRA, AIS_VESSEL_LEN)),
        _ => None,
    }
}

/// Accumulate one byte into an X.25 checksum.
fn crc_accumulate(byte: u8, crc: u16) -> u16 {
    let mut tmp = byte ^ (crc & 0xff) as u8;
    tmp ^= tmp << 4;
    let tmp = tmp as u16;
    (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
}

/// X.25 checksum over `bytes`, starting from 0xFFFF.
pub fn crc_x25(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |crc, &b| crc_accumulate(b, crc))
}

/// Counters for frames the parser could not deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames delivered as messages.
    pub frames_decoded: u64,
    /// Frames dropped because the checksum did not match.
    pub crc_errors: u64,
    /// Frames dropped because the message id has no known CRC_EXTRA.
    pub unknown_messages: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for a start marker.
    Idle,
    /// Collecting header bytes.
    Header,
    /// Collecting payload, checksum and optional signature.
    Body,
}

/// Incremental MAVLink frame parser.
pub struct MavlinkParser {
    state: ParseState,
    frame: Vec<u8>,
    header_len: usize,
    frame_len: usize,
    stats: ParserStats,
}

impl Default for MavlinkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MavlinkParser {
    /// Create a parser waiting for a start marker.
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            frame: Vec::with_capacity(HEADER_LEN_V2 + 255 + CHECKSUM_LEN + SIGNATURE_LEN),
            header_len: 0,
            frame_len: 0,
            stats: ParserStats::default(),
        }
    }

    /// Parser counters.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Feed a slice of bytes, collecting every completed message.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<MavlinkMessage> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    fn finish_frame(&mut self) -> Option<MavlinkMessage> {
        let frame = &self.frame;
        let payload_len = frame[1] as usize;
        let (msg_id, system_id, component_id) = if frame[0] == STX_V1 {
            (frame[5] as u32, frame[3], frame[4])
        } else {
            (
                u32::from_le_bytes([frame[7], frame[8], frame[9], 0]),
                frame[5],
                frame[6],
            )
        };

        let Some((crc_extra, full_len)) = message_info(msg_id) else {
            self.stats.unknown_messages += 1;
            trace!(msg_id, system_id, component_id, "Dropping MAVLink frame with unknown id");
            return None;
        };

        let payload_end = self.header_len + payload_len;
        let crc = crc_accumulate(crc_extra, crc_x25(&frame[1..payload_end]));
        let declared = u16::from_le_bytes([frame[payload_end], frame[payload_end + 1]]);
        if crc != declared {
            self.stats.crc_errors += 1;
            trace!(
                msg_id,
                declared = %format!("{:#06x}", declared),
                computed = %format!("{:#06x}", crc),
                "Dropping MAVLink frame with bad checksum"
            );
            return None;
        }

        let mut payload = frame[self.header_len..payload_end].to_vec();
        if payload.len() < full_len {
            payload.resize(full_len, 0);
        }

        self.stats.frames_decoded += 1;
        trace!(msg_id, system_id, component_id, "MAVLink frame decoded");

        Some(match msg_id {
            HEARTBEAT_ID => MavlinkMessage::Heartbeat(Heartbeat::decode(&payload)),
            _ => MavlinkMessage::AisVessel(AisVessel::decode(&payload)),
        })
    }
}

impl FrameDecoder for MavlinkParser {
    fn feed(&mut self, byte: u8) -> Option<MavlinkMessage> {
        match self.state {
            ParseState::Idle => {
                self.header_len = match byte {
                    STX_V1 => HEADER_LEN_V1,
                    STX_V2 => HEADER_LEN_V2,
                    _ => return None,
                };
                self.frame.clear();
                self.frame.push(byte);
                self.state = ParseState::Header;
                None
            }
            ParseState::Header => {
                self.frame.push(byte);
                if self.frame.len() == self.header_len {
                    let payload_len = self.frame[1] as usize;
                    let signed =
                        self.frame[0] == STX_V2 && self.frame[2] & INCOMPAT_FLAG_SIGNED != 0;
                    self.frame_len = self.header_len
                        + payload_len
                        + CHECKSUM_LEN
                        + if signed { SIGNATURE_LEN } else { 0 };
                    self.state = ParseState::Body;
                }
                None
            }
            ParseState::Body => {
                self.frame.push(byte);
                if self.frame.len() < self.frame_len {
                    return None;
                }
                self.state = ParseState::Idle;
                self.finish_frame()
            }
        }
    }

    fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.frame.clear();
    }
}

/// Build a MAVLink v2 frame (unsigned, trailing payload zeros truncated).
pub fn encode_v2(message: &MavlinkMessage, sequence: u8, system_id: u8, component_id: u8) -> Vec<u8> {
    let mut payload = message.payload();
    while payload.len() > 1 && payload.last() == Some(&0) {
        payload.pop();
    }

    let id = message.id().to_le_bytes();
    let mut frame = BytesMut::with_capacity(HEADER_LEN_V2 + payload.len() + CHECKSUM_LEN);
    frame.put_u8(STX_V2);
    frame.put_u8(payload.len() as u8);
    frame.put_u8(0); // incompat flags
    frame.put_u8(0); // compat flags
    frame.put_u8(sequence);
    frame.put_u8(system_id);
    frame.put_u8(component_id);
    frame.put_slice(&id[..3]);
    frame.put_slice(&payload);
    append_checksum(&mut frame, message.id());
    frame.to_vec()
}

/// Build a MAVLink v1 frame. Returns `None` for ids that do not fit in one byte.
pub fn encode_v1(
    message: &MavlinkMessage,
    sequence: u8,
    system_id: u8,
    component_id: u8,
) -> Option<Vec<u8>> {
    let id = u8::try_from(message.id()).ok()?;
    let payload = message.payload();

    let mut frame = BytesMut::with_capacity(HEADER_LEN_V1 + payload.len() + CHECKSUM_LEN);
    frame.put_u8(STX_V1);
    frame.put_u8(payload.len() as u8);
    frame.put_u8(sequence);
    frame.put_u8(system_id);
    frame.put_u8(component_id);
    frame.put_u8(id);
    frame.put_slice(&payload);
    append_checksum(&mut frame, message.id());
    Some(frame.to_vec())
}

fn append_checksum(frame: &mut BytesMut, msg_id: u32) {
    let crc_extra = message_info(msg_id).map(|(extra, _)| extra).unwrap_or(0);
    let crc = crc_accumulate(crc_extra, crc_x25(&frame[1..]));
    frame.put_u16_le(crc);
}
