//! Conversion of decoded wire messages into [`VesselReport`]s.
//!
//! | Field    | AIS                     | MAVLink `AIS_VESSEL`        |
//! |----------|-------------------------|-----------------------------|
//! | lat/lon  | 1/600000 deg (91/181 NA)| degE7                       |
//! | speed    | 0.1 kn (1023 NA)        | cm/s (65535 NA)             |
//! | course   | 0.1 deg (3600 NA)       | cdeg (65535 NA)             |
//! | heading  | deg (511 NA)            | cdeg (65535 NA)             |
//!
//! Anything unavailable or out of range becomes `None`.

use crate::codec::{AisBody, AisMessage, AisVessel, MavlinkMessage, PositionFields};

use super::state::{ReportOrigin, ReportProtocol, VesselReport};

/// AIS coordinates are in 1/10000 minute.
const AIS_COORD_SCALE: f64 = 600_000.0;

/// MAVLink coordinates are in degE7.
const MAVLINK_COORD_SCALE: f64 = 10_000_000.0;

const AIS_SPEED_NA: u16 = 1023;
const AIS_COURSE_NA: u16 = 3600;
const AIS_HEADING_NA: u16 = 511;
const MAVLINK_NA: u16 = u16::MAX;

/// Centimetres per second to knots.
const CM_S_TO_KNOTS: f32 = 0.019_438_4;

/// Normalize a decoded AIS message.
pub fn from_ais(message: &AisMessage, origin: &ReportOrigin) -> VesselReport {
    let mut report = VesselReport::empty(origin, ReportProtocol::Nmea);
    report.mmsi = mmsi(message.mmsi);

    match &message.body {
        AisBody::Position(position) => apply_position(&mut report, position),
        AisBody::BaseStation {
            longitude_raw,
            latitude_raw,
        } => {
            (report.latitude, report.longitude) = ais_coordinates(*latitude_raw, *longitude_raw);
        }
        AisBody::StaticVoyage {
            callsign,
            name,
            ship_type,
        } => {
            report.callsign = text(callsign);
            report.name = text(name);
            report.vessel_type = vessel_type(*ship_type);
        }
        AisBody::ExtendedClassB {
            position,
            name,
            ship_type,
        } => {
            apply_position(&mut report, position);
            report.name = text(name);
            report.vessel_type = vessel_type(*ship_type);
        }
        AisBody::AidToNavigation {
            name,
            longitude_raw,
            latitude_raw,
            ..
        } => {
            report.name = text(name);
            (report.latitude, report.longitude) = ais_coordinates(*latitude_raw, *longitude_raw);
        }
        AisBody::StaticNameA { name } => report.name = text(name),
        AisBody::StaticDataB {
            ship_type,
            callsign,
        } => {
            report.vessel_type = vessel_type(*ship_type);
            report.callsign = text(callsign);
        }
        AisBody::Other => {}
    }

    report
}

/// Normalize a decoded MAVLink message. Only `AIS_VESSEL` yields a report.
pub fn from_mavlink(message: &MavlinkMessage, origin: &ReportOrigin) -> Option<VesselReport> {
    match message {
        MavlinkMessage::AisVessel(vessel) => Some(from_ais_vessel(vessel, origin)),
        MavlinkMessage::Heartbeat(_) => None,
    }
}

fn from_ais_vessel(vessel: &AisVessel, origin: &ReportOrigin) -> VesselReport {
    let mut report = VesselReport::empty(origin, ReportProtocol::Mavlink);
    report.mmsi = mmsi(vessel.mmsi);
    report.latitude = coordinate(vessel.lat as f64 / MAVLINK_COORD_SCALE, 90.0);
    report.longitude = coordinate(vessel.lon as f64 / MAVLINK_COORD_SCALE, 180.0);
    report.course_over_ground = centidegrees(vessel.cog);
    report.heading = centidegrees(vessel.heading);
    report.speed_over_ground =
        (vessel.velocity != MAVLINK_NA).then(|| vessel.velocity as f32 * CM_S_TO_KNOTS);
    report.name = text(&vessel.name);
    report.callsign = text(&vessel.callsign);
    report.vessel_type = vessel_type(vessel.vessel_type);
    report
}

fn apply_position(report: &mut VesselReport, position: &PositionFields) {
    (report.latitude, report.longitude) =
        ais_coordinates(position.latitude_raw, position.longitude_raw);
    report.speed_over_ground =
        (position.speed_raw != AIS_SPEED_NA).then(|| position.speed_raw as f32 / 10.0);
    report.course_over_ground =
        (position.course_raw < AIS_COURSE_NA).then(|| position.course_raw as f32 / 10.0);
    report.heading = (position.heading_raw != AIS_HEADING_NA && position.heading_raw < 360)
        .then_some(position.heading_raw as f32);
}

fn ais_coordinates(latitude_raw: i32, longitude_raw: i32) -> (Option<f64>, Option<f64>) {
    (
        coordinate(latitude_raw as f64 / AIS_COORD_SCALE, 90.0),
        coordinate(longitude_raw as f64 / AIS_COORD_SCALE, 180.0),
    )
}

fn coordinate(value: f64, limit: f64) -> Option<f64> {
    (value.abs() <= limit).then_some(value)
}

fn centidegrees(raw: u16) -> Option<f32> {
    if raw == MAVLINK_NA {
        return None;
    }
    let degrees = raw as f32 / 100.0;
    (degrees < 360.0).then_some(degrees)
}

fn mmsi(raw: u32) -> Option<u32> {
    (raw != 0).then_some(raw)
}

fn vessel_type(raw: u8) -> Option<u8> {
    (raw != 0).then_some(raw)
}

fn text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AisDecoder, Heartbeat, SentenceDecoder};
    use crate::fleet::state::Transport;

    fn origin() -> ReportOrigin {
        ReportOrigin::new("10.0.0.5:5555".parse().unwrap(), Transport::Udp)
    }

    fn decode(sentence: &str) -> AisMessage {
        AisDecoder::new()
            .decode(origin().source, sentence)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_class_a_out_of_range_fields_are_absent() {
        let report = from_ais(
            &decode("!AIVDM,1,1,,A,13u?et@01G?Q@<L1R0<:wvP00000,0*0D"),
            &origin(),
        );

        assert_eq!(report.mmsi, Some(265547249));
        assert_eq!(report.protocol, ReportProtocol::Nmea);
        assert_eq!(report.transport, Transport::Udp);
        // Raw longitude decodes to ~217 degrees, outside the valid range.
        assert_eq!(report.longitude, None);
        assert!((report.latitude.unwrap() - 2.676133).abs() < 1e-5);
        assert_eq!(report.speed_over_ground, Some(8.7));
        assert_eq!(report.course_over_ground, Some(281.5));
        // Heading 464 is not a valid bearing.
        assert_eq!(report.heading, None);
        assert_eq!(report.name, None);
    }

    #[test]
    fn test_class_a_heading_not_available() {
        let report = from_ais(
            &decode("!AIVDM,1,1,,A,15N:;P0P00PD;88MD5MTDww@0<2Q,0*5C"),
            &origin(),
        );

        assert_eq!(report.mmsi, Some(367168384));
        assert!((report.latitude.unwrap() - 51.2296).abs() < 1e-3);
        assert!((report.longitude.unwrap() - 4.4070).abs() < 1e-3);
        assert_eq!(report.heading, None);
        assert_eq!(report.speed_over_ground, Some(0.0));
        assert_eq!(report.course_over_ground, Some(110.7));
    }

    #[test]
    fn test_ais_not_available_codes() {
        let message = AisMessage {
            msg_type: 18,
            mmsi: 0,
            body: AisBody::Position(PositionFields {
                nav_status: None,
                turn_rate: None,
                speed_raw: 1023,
                longitude_raw: 181 * 600_000,
                latitude_raw: 91 * 600_000,
                course_raw: 3600,
                heading_raw: 511,
            }),
        };
        let report = from_ais(&message, &origin());

        assert_eq!(report.mmsi, None);
        assert_eq!(report.latitude, None);
        assert_eq!(report.longitude, None);
        assert_eq!(report.speed_over_ground, None);
        assert_eq!(report.course_over_ground, None);
        assert_eq!(report.heading, None);
    }

    #[test]
    fn test_other_message_type_counts_vessel() {
        let report = from_ais(&decode("!AIVDM,1,1,,A,K3aDo80000000000,0*00"), &origin());

        assert_eq!(report.mmsi, Some(244660000));
        assert!(!report.has_position());
        assert_eq!(report.name, None);
        assert_eq!(report.vessel_type, None);
    }

    #[test]
    fn test_static_voyage_fields() {
        let message = AisMessage {
            msg_type: 5,
            mmsi: 244123456,
            body: AisBody::StaticVoyage {
                callsign: "PD1234".to_string(),
                name: "  ".to_string(),
                ship_type: 70,
            },
        };
        let report = from_ais(&message, &origin());

        assert_eq!(report.callsign.as_deref(), Some("PD1234"));
        assert_eq!(report.name, None);
        assert_eq!(report.vessel_type, Some(70));
        assert!(!report.has_position());
    }

    #[test]
    fn test_mavlink_vessel_conversion() {
        let vessel = AisVessel {
            mmsi: 367168384,
            lat: 512_296_000,
            lon: 44_070_000,
            cog: 11070,
            heading: 9000,
            velocity: 1000,
            vessel_type: 70,
            callsign: "WDC1234".to_string(),
            name: "EVER GIVEN".to_string(),
            ..Default::default()
        };
        let report = from_mavlink(&MavlinkMessage::AisVessel(vessel), &origin()).unwrap();

        assert_eq!(report.protocol, ReportProtocol::Mavlink);
        assert_eq!(report.mmsi, Some(367168384));
        assert!((report.latitude.unwrap() - 51.2296).abs() < 1e-9);
        assert!((report.longitude.unwrap() - 4.407).abs() < 1e-9);
        assert_eq!(report.course_over_ground, Some(110.7));
        assert_eq!(report.heading, Some(90.0));
        assert!((report.speed_over_ground.unwrap() - 19.4384).abs() < 1e-3);
        assert_eq!(report.name.as_deref(), Some("EVER GIVEN"));
        assert_eq!(report.callsign.as_deref(), Some("WDC1234"));
    }

    #[test]
    fn test_mavlink_unknown_values() {
        let vessel = AisVessel {
            mmsi: 1,
            lat: i32::MAX,
            cog: u16::MAX,
            heading: u16::MAX,
            velocity: u16::MAX,
            ..Default::default()
        };
        let report = from_mavlink(&MavlinkMessage::AisVessel(vessel), &origin()).unwrap();

        assert_eq!(report.latitude, None);
        assert_eq!(report.longitude, Some(0.0));
        assert_eq!(report.course_over_ground, None);
        assert_eq!(report.heading, None);
        assert_eq!(report.speed_over_ground, None);
        assert_eq!(report.vessel_type, None);
    }

    #[test]
    fn test_heartbeat_yields_no_report() {
        let heartbeat = MavlinkMessage::Heartbeat(Heartbeat {
            custom_mode: 0,
            mav_type: 2,
            autopilot: 3,
            base_mode: 0,
            system_status: 4,
            mavlink_version: 3,
        });
        assert!(from_mavlink(&heartbeat, &origin()).is_none());
    }
}
