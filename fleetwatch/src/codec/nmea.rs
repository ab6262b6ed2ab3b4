//! AIS NMEA 0183 sentence decoding (`!AIVDM` / `!AIVDO`).
//!
//! A sentence looks like:
//!
//! ```text
//! !AIVDM,1,1,,A,13u?et@01G?Q@<L1R0<:wvP00000,0*0D
//!  |     | | | | |                            | |
//!  |     | | | | payload (6-bit armored)      | checksum
//!  |     | | | radio channel                  fill bits
//!  |     | | sequential message id (multi-fragment only)
//!  |     | fragment number
//!  |     fragment count
//!  talker + sentence type
//! ```
//!
//! Multi-fragment messages are reassembled here, keyed by sender, sequential
//! id and channel. The checksum is verified but a mismatch only produces a debug log;
//! real-world feeds routinely carry bad checksums on otherwise valid payloads.
//!
//! Decoded messages keep AIS-native units (tenths of knots, 1/600000 degree,
//! 511 = no heading). Unit conversion and "not available" handling belong to
//! the report normalizer.

use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::{debug, trace};

use super::SentenceDecoder;

/// Maximum number of incomplete multi-fragment groups kept at once.
const MAX_PENDING_GROUPS: usize = 16;

/// Maximum fragment count accepted in a sentence header.
const MAX_FRAGMENTS: u8 = 9;

/// Error decoding an AIS sentence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Sentence is valid NMEA framing but not an AIS VDM/VDO sentence.
    #[error("Not an AIS sentence: {0}")]
    NotAis(String),

    /// Sentence framing is broken.
    #[error("Malformed sentence: {0}")]
    Malformed(&'static str),

    /// Payload contains a character outside the 6-bit armoring alphabet.
    #[error("Invalid payload character {0:?}")]
    InvalidCharacter(char),

    /// Payload is shorter than the fields required by its message type.
    #[error("Payload too short for message type {msg_type}: {bits} bits")]
    PayloadTooShort { msg_type: u8, bits: usize },

    /// Message type is not defined by ITU-R M.1371 (0 or above 27).
    #[error("Unsupported AIS message type {0}")]
    UnsupportedType(u8),
}

/// Position fields shared by class A (1/2/3) and class B (18/19) reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionFields {
    /// Navigational status (class A only).
    pub nav_status: Option<u8>,
    /// Rate of turn, raw AIS encoding (class A only).
    pub turn_rate: Option<i8>,
    /// Speed over ground in 0.1 knot steps (1023 = not available).
    pub speed_raw: u16,
    /// Longitude in 1/600000 degree (181° = not available).
    pub longitude_raw: i32,
    /// Latitude in 1/600000 degree (91° = not available).
    pub latitude_raw: i32,
    /// Course over ground in 0.1 degree steps (3600 = not available).
    pub course_raw: u16,
    /// True heading in degrees (511 = not available).
    pub heading_raw: u16,
}

/// Message-type specific body of a decoded AIS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AisBody {
    /// Types 1, 2, 3 (class A) and 18 (class B).
    Position(PositionFields),
    /// Type 4: base station report.
    BaseStation { longitude_raw: i32, latitude_raw: i32 },
    /// Type 5: static and voyage related data.
    StaticVoyage {
        callsign: String,
        name: String,
        ship_type: u8,
    },
    /// Type 19: extended class B position report.
    ExtendedClassB {
        position: PositionFields,
        name: String,
        ship_type: u8,
    },
    /// Type 21: aid to navigation report.
    AidToNavigation {
        aid_type: u8,
        name: String,
        longitude_raw: i32,
        latitude_raw: i32,
    },
    /// Type 24 part A: vessel name.
    StaticNameA { name: String },
    /// Type 24 part B: ship type and callsign.
    StaticDataB { ship_type: u8, callsign: String },
    /// Any other defined type (6-17, 20, 22, 23, 25-27). Only the MMSI is
    /// used.
    Other,
}

/// A fully decoded AIS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AisMessage {
    pub msg_type: u8,
    pub mmsi: u32,
    pub body: AisBody,
}

/// Parsed header fields of one sentence.
struct Fragment<'a> {
    total: u8,
    number: u8,
    sequence_id: &'a str,
    channel: &'a str,
    payload: &'a str,
    fill_bits: u8,
}

/// Fragments of a multi-sentence message collected so far.
struct PendingGroup {
    total: u8,
    parts: Vec<Option<String>>,
    fill_bits: u8,
}

/// Stateful AIS sentence decoder.
///
/// Holds incomplete multi-fragment groups between calls. Groups are keyed by
/// sender as well as sequential id and channel, so one instance can serve a
/// socket shared by several senders.
#[derive(Default)]
pub struct AisDecoder {
    pending: HashMap<GroupKey, PendingGroup>,
}

/// Sender, sequential message id, radio channel.
type GroupKey = (SocketAddr, String, String);

impl AisDecoder {
    /// Create a new decoder with no pending fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of multi-fragment groups waiting for more sentences.
    pub fn pending_groups(&self) -> usize {
        self.pending.len()
    }

    fn assemble(
        &mut self,
        source: SocketAddr,
        fragment: Fragment<'_>,
    ) -> Result<Option<(String, u8)>, DecodeError> {
        if fragment.total == 1 {
            return Ok(Some((fragment.payload.to_string(), fragment.fill_bits)));
        }

        let key = (
            source,
            fragment.sequence_id.to_string(),
            fragment.channel.to_string(),
        );

        if fragment.number == 1 {
            if self.pending.len() >= MAX_PENDING_GROUPS && !self.pending.contains_key(&key) {
                debug!(
                    pending = self.pending.len(),
                    "Too many incomplete AIS fragment groups, discarding them"
                );
                self.pending.clear();
            }
            let mut parts = vec![None; fragment.total as usize];
            parts[0] = Some(fragment.payload.to_string());
            self.pending.insert(
                key,
                PendingGroup {
                    total: fragment.total,
                    parts,
                    fill_bits: fragment.fill_bits,
                },
            );
            return Ok(None);
        }

        let Some(group) = self.pending.get_mut(&key) else {
            return Err(DecodeError::Malformed("fragment without a preceding first part"));
        };
        if group.total != fragment.total {
            self.pending.remove(&key);
            return Err(DecodeError::Malformed("fragment count changed within a group"));
        }

        group.parts[fragment.number as usize - 1] = Some(fragment.payload.to_string());
        group.fill_bits = fragment.fill_bits;

        if group.parts.iter().any(Option::is_none) {
            return Ok(None);
        }

        Ok(self.pending.remove(&key).map(|group| {
            let payload: String = group.parts.into_iter().flatten().collect();
            (payload, group.fill_bits)
        }))
    }
}

impl SentenceDecoder for AisDecoder {
    fn decode(
        &mut self,
        source: SocketAddr,
        sentence: &str,
    ) -> Result<Option<AisMessage>, DecodeError> {
        let fragment = parse_sentence(sentence)?;
        trace!(
            %source,
            total = fragment.total,
            number = fragment.number,
            channel = fragment.channel,
            "AIS fragment"
        );

        match self.assemble(source, fragment)? {
            Some((payload, fill_bits)) => decode_payload(&payload, fill_bits).map(Some),
            None => Ok(None),
        }
    }
}

/// Split a sentence into its header fields and verify the checksum.
fn parse_sentence(sentence: &str) -> Result<Fragment<'_>, DecodeError> {
    let sentence = sentence.trim();
    let body = sentence
        .strip_prefix('!')
        .or_else(|| sentence.strip_prefix('$'))
        .ok_or(DecodeError::Malformed("missing '!' or '$' start character"))?;

    let (data, checksum) = match body.split_once('*') {
        Some((data, checksum)) => (data, Some(checksum)),
        None => (body, None),
    };

    if let Some(declared) = checksum {
        let computed = data.bytes().fold(0u8, |acc, b| acc ^ b);
        match u8::from_str_radix(declared.trim(), 16) {
            Ok(declared) if declared == computed => {}
            Ok(declared) => debug!(
                declared = %format!("{:02X}", declared),
                computed = %format!("{:02X}", computed),
                sentence,
                "AIS checksum mismatch"
            ),
            Err(_) => return Err(DecodeError::Malformed("checksum is not hexadecimal")),
        }
    }

    let fields: Vec<&str> = data.split(',').collect();
    let header = fields[0];
    if header.len() != 5 || !(header.ends_with("VDM") || header.ends_with("VDO")) {
        return Err(DecodeError::NotAis(header.to_string()));
    }
    if fields.len() < 7 {
        return Err(DecodeError::Malformed("expected 7 comma-separated fields"));
    }

    let total: u8 = fields[1]
        .parse()
        .map_err(|_| DecodeError::Malformed("fragment count is not a number"))?;
    let number: u8 = fields[2]
        .parse()
        .map_err(|_| DecodeError::Malformed("fragment number is not a number"))?;
    if total == 0 || total > MAX_FRAGMENTS || number == 0 || number > total {
        return Err(DecodeError::Malformed("fragment number out of range"));
    }

    let fill_bits: u8 = if fields[6].is_empty() {
        0
    } else {
        fields[6]
            .parse()
            .map_err(|_| DecodeError::Malformed("fill bits is not a number"))?
    };
    if fill_bits > 5 {
        return Err(DecodeError::Malformed("fill bits out of range"));
    }

    Ok(Fragment {
        total,
        number,
        sequence_id: fields[3],
        channel: fields[4],
        payload: fields[5],
        fill_bits,
    })
}

/// De-armored AIS payload with bit-level field access.
struct Payload {
    sextets: Vec<u8>,
    bits: usize,
}

impl Payload {
    fn dearmor(armored: &str, fill_bits: u8) -> Result<Self, DecodeError> {
        let sextets = armored
            .chars()
            .map(|ch| match ch as u32 {
                48..=87 => Ok((ch as u32 - 48) as u8),
                96..=119 => Ok((ch as u32 - 56) as u8),
                _ => Err(DecodeError::InvalidCharacter(ch)),
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let bits = (sextets.len() * 6).saturating_sub(fill_bits as usize);
        Ok(Self { sextets, bits })
    }

    fn require(&self, msg_type: u8, bits: usize) -> Result<(), DecodeError> {
        if self.bits < bits {
            return Err(DecodeError::PayloadTooShort {
                msg_type,
                bits: self.bits,
            });
        }
        Ok(())
    }

    fn bit(&self, index: usize) -> u32 {
        let sextet = self.sextets[index / 6];
        ((sextet >> (5 - index % 6)) & 1) as u32
    }

    fn unsigned(&self, start: usize, width: usize) -> u32 {
        (start..start + width).fold(0, |acc, i| (acc << 1) | self.bit(i))
    }

    fn signed(&self, start: usize, width: usize) -> i32 {
        let raw = self.unsigned(start, width) as i64;
        if raw & (1 << (width - 1)) != 0 {
            (raw - (1 << width)) as i32
        } else {
            raw as i32
        }
    }

    /// Decode 6-bit ASCII text, dropping '@' padding and trailing spaces.
    fn text(&self, start: usize, chars: usize) -> String {
        let decoded: String = (0..chars)
            .map(|i| {
                let v = self.unsigned(start + i * 6, 6) as u8;
                if v < 32 {
                    (v + 64) as char
                } else {
                    v as char
                }
            })
            .collect();
        decoded
            .split('@')
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string()
    }

    fn class_b_position(&self) -> PositionFields {
        PositionFields {
            nav_status: None,
            turn_rate: None,
            speed_raw: self.unsigned(46, 10) as u16,
            longitude_raw: self.signed(57, 28),
            latitude_raw: self.signed(85, 27),
            course_raw: self.unsigned(112, 12) as u16,
            heading_raw: self.unsigned(124, 9) as u16,
        }
    }
}

/// Decode a complete (reassembled) armored payload.
fn decode_payload(armored: &str, fill_bits: u8) -> Result<AisMessage, DecodeError> {
    let payload = Payload::dearmor(armored, fill_bits)?;
    payload.require(0, 38)?;

    let msg_type = payload.unsigned(0, 6) as u8;
    let mmsi = payload.unsigned(8, 30);

    let body = match msg_type {
        1..=3 => {
            payload.require(msg_type, 137)?;
            AisBody::Position(PositionFields {
                nav_status: Some(payload.unsigned(38, 4) as u8),
                turn_rate: Some(payload.signed(42, 8) as i8),
                speed_raw: payload.unsigned(50, 10) as u16,
                longitude_raw: payload.signed(61, 28),
                latitude_raw: payload.signed(89, 27),
                course_raw: payload.unsigned(116, 12) as u16,
                heading_raw: payload.unsigned(128, 9) as u16,
            })
        }
        4 => {
            payload.require(msg_type, 134)?;
            AisBody::BaseStation {
                longitude_raw: payload.signed(79, 28),
                latitude_raw: payload.signed(107, 27),
            }
        }
        5 => {
            payload.require(msg_type, 240)?;
            AisBody::StaticVoyage {
                callsign: payload.text(70, 7),
                name: payload.text(112, 20),
                ship_type: payload.unsigned(232, 8) as u8,
            }
        }
        18 => {
            payload.require(msg_type, 133)?;
            AisBody::Position(payload.class_b_position())
        }
        19 => {
            payload.require(msg_type, 271)?;
            AisBody::ExtendedClassB {
                position: payload.class_b_position(),
                name: payload.text(143, 20),
                ship_type: payload.unsigned(263, 8) as u8,
            }
        }
        21 => {
            payload.require(msg_type, 219)?;
            AisBody::AidToNavigation {
                aid_type: payload.unsigned(38, 5) as u8,
                name: payload.text(43, 20),
                longitude_raw: payload.signed(164, 28),
                latitude_raw: payload.signed(192, 27),
            }
        }
        24 => {
            payload.require(msg_type, 40)?;
            match payload.unsigned(38, 2) {
                0 => {
                    payload.require(msg_type, 160)?;
                    AisBody::StaticNameA {
                        name: payload.text(40, 20),
                    }
                }
                1 => {
                    payload.require(msg_type, 132)?;
                    AisBody::StaticDataB {
                        ship_type: payload.unsigned(40, 8) as u8,
                        callsign: payload.text(90, 7),
                    }
                }
                _ => return Err(DecodeError::Malformed("unknown type 24 part number")),
            }
        }
        6..=17 | 20 | 22 | 23 | 25..=27 => AisBody::Other,
        other => return Err(DecodeError::UnsupportedType(other)),
    };

    Ok(AisMessage {
        msg_type,
        mmsi,
        body,
    })
}
