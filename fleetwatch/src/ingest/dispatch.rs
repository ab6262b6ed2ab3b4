//! Routing of framed units to decoders and the aggregator.
//!
//! One [`Dispatcher`] per connection (and one for the UDP socket). It owns the
//! decoder state, so partially received MAVLink frames never mix between
//! connections. AIS fragment groups are keyed by sender inside the decoder,
//! which keeps the datagrams of different UDP senders apart too.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec::{AisDecoder, FrameDecoder, MavlinkParser, SentenceDecoder};
use crate::fleet::normalize;
use crate::fleet::{FleetAggregator, ReportOrigin};

use super::splitter::{classify, FrameUnit, SENTENCE_SENTINELS};

/// Per-dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sentences: u64,
    pub binary_bytes: u64,
    pub reports: u64,
    pub decode_errors: u64,
}

/// Feeds framed units through the decoders into the aggregator.
pub struct Dispatcher<S = AisDecoder, F = MavlinkParser> {
    origin: ReportOrigin,
    aggregator: Arc<FleetAggregator>,
    sentences: S,
    frames: F,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher with the bundled AIS and MAVLink decoders.
    pub fn new(origin: ReportOrigin, aggregator: Arc<FleetAggregator>) -> Self {
        Self::with_decoders(origin, aggregator, AisDecoder::new(), MavlinkParser::new())
    }
}

impl<S: SentenceDecoder, F: FrameDecoder> Dispatcher<S, F> {
    /// Create a dispatcher with custom decoders.
    pub fn with_decoders(
        origin: ReportOrigin,
        aggregator: Arc<FleetAggregator>,
        sentences: S,
        frames: F,
    ) -> Self {
        Self {
            origin,
            aggregator,
            sentences,
            frames,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn origin(&self) -> &ReportOrigin {
        &self.origin
    }

    /// Access the binary frame decoder.
    pub fn frame_decoder(&self) -> &F {
        &self.frames
    }

    /// Handle one unit from a stream splitter.
    pub fn handle_unit(&mut self, unit: FrameUnit) {
        match unit {
            FrameUnit::Sentence(sentence) => self.handle_sentence(&sentence),
            FrameUnit::Binary(bytes) => self.handle_binary(&bytes),
        }
    }

    /// Handle one UDP datagram from `from`.
    ///
    /// A datagram that is valid UTF-8 and starts with a sentence sentinel is
    /// split into lines; anything else goes to the binary decoder as a whole.
    /// Binary framing never spans datagrams.
    pub fn handle_datagram(&mut self, from: SocketAddr, datagram: &[u8]) {
        self.origin.source = from;

        let is_sentence = std::str::from_utf8(datagram)
            .map(|text| {
                text.trim_start()
                    .as_bytes()
                    .first()
                    .is_some_and(|b| SENTENCE_SENTINELS.contains(b))
            })
            .unwrap_or(false);

        if is_sentence {
            for line in datagram.split(|&b| b == b'\n') {
                if let Some(unit) = classify(line) {
                    self.handle_unit(unit);
                }
            }
        } else {
            self.handle_binary(datagram);
            self.frames.reset();
        }
    }

    fn handle_sentence(&mut self, sentence: &str) {
        self.stats.sentences += 1;

        match self.sentences.decode(self.origin.source, sentence) {
            Ok(Some(message)) => {
                trace!(
                    msg_type = message.msg_type,
                    mmsi = message.mmsi,
                    source = %self.origin.source,
                    "AIS message decoded"
                );
                let report = normalize::from_ais(&message, &self.origin);
                self.aggregator.apply(report);
                self.stats.reports += 1;
            }
            Ok(None) => trace!(sentence, "AIS fragment buffered"),
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!(
                    source = %self.origin.source,
                    error = %e,
                    raw = sentence,
                    "Dropping undecodable sentence"
                );
            }
        }
    }

    fn handle_binary(&mut self, bytes: &[u8]) {
        self.stats.binary_bytes += bytes.len() as u64;

        for &byte in bytes {
            let Some(message) = self.frames.feed(byte) else {
                continue;
            };
            match normalize::from_mavlink(&message, &self.origin) {
                Some(report) => {
                    self.aggregator.apply(report);
                    self.stats.reports += 1;
                }
                None => trace!(
                    msg_id = message.id(),
                    source = %self.origin.source,
                    "MAVLink message carries no vessel data"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mavlink::{encode_v2, AisVessel, MavlinkMessage};
    use crate::fleet::{FleetStatus, Transport};
    use crate::ingest::FrameSplitter;
    use bytes::Bytes;
    use tokio::sync::broadcast;

    const SAMPLE_A: &str = "!AIVDM,1,1,,A,13u?et@01G?Q@<L1R0<:wvP00000,0*0D";
    const SAMPLE_B: &str = "!AIVDM,1,1,,A,15N:;P0P00PD;88MD5MTDww@0<2Q,0*5C";

    /// Frame decoder that only counts the bytes it is given.
    #[derive(Default)]
    struct CountingDecoder {
        bytes: usize,
        resets: usize,
    }

    impl FrameDecoder for CountingDecoder {
        fn feed(&mut self, _byte: u8) -> Option<MavlinkMessage> {
            self.bytes += 1;
            None
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn make_aggregator() -> Arc<FleetAggregator> {
        let (broadcast_tx, _) = broadcast::channel(16);
        Arc::new(FleetAggregator::new(broadcast_tx))
    }

    fn origin(transport: Transport) -> ReportOrigin {
        ReportOrigin::new("127.0.0.1:50000".parse().unwrap(), transport)
    }

    #[test]
    fn test_two_sample_sentences_count_two_vessels() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Tcp), aggregator.clone());
        let mut splitter = FrameSplitter::new();

        let stream = format!("{}\r\n{}\r\n", SAMPLE_A, SAMPLE_B);
        for unit in splitter.push(stream.as_bytes()).unwrap() {
            dispatcher.handle_unit(unit);
        }

        assert_eq!(aggregator.fleet_count(), 2);
        assert_eq!(aggregator.status(), FleetStatus::Active);
        assert_eq!(aggregator.latest().unwrap().mmsi, Some(367168384));
        assert_eq!(dispatcher.stats().reports, 2);
    }

    #[test]
    fn test_mavlink_frame_reaches_aggregator() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Tcp), aggregator.clone());

        let vessel = AisVessel {
            mmsi: 244660000,
            lat: 520_000_000,
            lon: 43_000_000,
            ..Default::default()
        };
        let frame = encode_v2(&MavlinkMessage::AisVessel(vessel), 0, 1, 1);
        dispatcher.handle_unit(FrameUnit::Binary(Bytes::from(frame)));

        let latest = aggregator.latest().unwrap();
        assert_eq!(latest.mmsi, Some(244660000));
        assert_eq!(latest.latitude, Some(52.0));
    }

    #[test]
    fn test_decode_error_counted_not_applied() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Tcp), aggregator.clone());

        dispatcher.handle_unit(FrameUnit::Sentence("$GPGGA,123519".to_string()));

        assert_eq!(dispatcher.stats().decode_errors, 1);
        assert_eq!(aggregator.status(), FleetStatus::Inactive);
    }

    #[test]
    fn test_binary_fallback_forwards_every_byte() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::with_decoders(
            origin(Transport::Tcp),
            aggregator,
            AisDecoder::new(),
            CountingDecoder::default(),
        );
        let mut splitter = FrameSplitter::new();

        let mut bytes: Vec<u8> = (0x80..=0xBF).collect();
        bytes.extend(0xF8..=0xFF);
        for unit in splitter.push(&bytes).unwrap() {
            dispatcher.handle_unit(unit);
        }

        assert_eq!(dispatcher.frame_decoder().bytes, bytes.len());
        assert_eq!(dispatcher.stats().sentences, 0);
    }

    #[test]
    fn test_datagram_with_sentences() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Udp), aggregator.clone());
        let from: SocketAddr = "10.1.1.1:9000".parse().unwrap();

        let datagram = format!("{}\r\n{}\r\n", SAMPLE_A, SAMPLE_B);
        dispatcher.handle_datagram(from, datagram.as_bytes());

        assert_eq!(aggregator.fleet_count(), 2);
        assert_eq!(aggregator.snapshot().last_source, Some(from));
    }

    #[test]
    fn test_datagram_without_terminator() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Udp), aggregator.clone());

        dispatcher.handle_datagram("10.1.1.1:9000".parse().unwrap(), SAMPLE_A.as_bytes());
        assert_eq!(aggregator.fleet_count(), 1);
    }

    #[test]
    fn test_binary_datagram_resets_parser() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::with_decoders(
            origin(Transport::Udp),
            aggregator,
            AisDecoder::new(),
            CountingDecoder::default(),
        );

        dispatcher.handle_datagram("10.1.1.1:9000".parse().unwrap(), &[0xFD, 0x01, 0x02]);
        dispatcher.handle_datagram("10.1.1.1:9000".parse().unwrap(), b"plain text");

        assert_eq!(dispatcher.frame_decoder().bytes, 3 + 10);
        assert_eq!(dispatcher.frame_decoder().resets, 2);
    }

    #[test]
    fn test_interleaved_fragments_from_two_senders() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Udp), aggregator.clone());
        let first: SocketAddr = "10.1.1.1:9000".parse().unwrap();
        let second: SocketAddr = "10.1.1.2:9000".parse().unwrap();

        // Same sequence id and channel from both senders.
        dispatcher.handle_datagram(first, b"!AIVDM,2,1,3,B,13u?et@01G?Q@<,0\r\n");
        dispatcher.handle_datagram(second, b"!AIVDM,2,1,3,B,15N:;P0P00PD;8,0\r\n");
        dispatcher.handle_datagram(first, b"!AIVDM,2,2,3,B,L1R0<:wvP00000,0\r\n");
        dispatcher.handle_datagram(second, b"!AIVDM,2,2,3,B,8MD5MTDww@0<2Q,0\r\n");

        assert_eq!(dispatcher.stats().decode_errors, 0);
        assert_eq!(dispatcher.stats().reports, 2);
        assert_eq!(aggregator.fleet_count(), 2);
        assert_eq!(aggregator.latest().unwrap().mmsi, Some(367168384));
        assert_eq!(aggregator.snapshot().last_source, Some(second));
    }

    #[test]
    fn test_mavlink_frames_decoded_at_every_chunk_size() {
        let vessels: [(u32, i32, i32, &str, &str); 3] = [
            (244660000, 520_000_000, 43_000_000, "PDHW", "ATLANTIC STAR"),
            (367168384, 512_296_360, 44_070_460, "WDC1234", "EVER GIVEN"),
            // Checksum bytes of this frame are printable ASCII ("WC").
            (265547264, 576_000_000, 118_000_000, "SFBQ", "STENA DANICA"),
        ];
        let frames: Vec<Vec<u8>> = vessels
            .iter()
            .enumerate()
            .map(|(seq, &(mmsi, lat, lon, callsign, name))| {
                let vessel = AisVessel {
                    mmsi,
                    lat,
                    lon,
                    callsign: callsign.to_string(),
                    name: name.to_string(),
                    ..Default::default()
                };
                encode_v2(&MavlinkMessage::AisVessel(vessel), seq as u8, 1, 1)
            })
            .collect();
        let stream = frames.concat();
        let frame_ends: Vec<usize> = frames
            .iter()
            .scan(0, |end, frame| {
                *end += frame.len();
                Some(*end)
            })
            .collect();

        for chunk_size in 1..=stream.len() {
            let aggregator = make_aggregator();
            let mut dispatcher = Dispatcher::new(origin(Transport::Tcp), aggregator.clone());
            let mut splitter = FrameSplitter::new();
            let mut pushed = 0;

            for chunk in stream.chunks(chunk_size) {
                for unit in splitter.push(chunk).unwrap() {
                    dispatcher.handle_unit(unit);
                }
                pushed += chunk.len();

                // Every frame whose last byte has arrived is already decoded.
                let complete = frame_ends.iter().filter(|&&end| end <= pushed).count();
                assert_eq!(
                    aggregator.fleet_count(),
                    complete,
                    "chunk size {} after {} bytes",
                    chunk_size,
                    pushed
                );
            }
            assert_eq!(splitter.buffered(), 0);
        }
    }

    #[test]
    fn test_mavlink_frame_split_across_datagrams_is_lost() {
        let aggregator = make_aggregator();
        let mut dispatcher = Dispatcher::new(origin(Transport::Udp), aggregator.clone());

        let vessel = AisVessel {
            mmsi: 1,
            ..Default::default()
        };
        let frame = encode_v2(&MavlinkMessage::AisVessel(vessel), 0, 1, 1);
        let from: SocketAddr = "10.1.1.1:9000".parse().unwrap();
        dispatcher.handle_datagram(from, &frame[..6]);
        dispatcher.handle_datagram(from, &frame[6..]);
        assert_eq!(aggregator.fleet_count(), 0);

        dispatcher.handle_datagram(from, &frame);
        assert_eq!(aggregator.fleet_count(), 1);
    }
}
