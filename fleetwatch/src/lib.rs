//! Fleetwatch - vessel report ingestion over TCP and UDP
//!
//! Accepts AIS NMEA sentences (`!AIVDM`/`!AIVDO`) and MAVLink v1/v2 frames on
//! a TCP listener and a UDP socket, decodes them into vessel reports, keeps
//! the latest fleet snapshot, and writes per-session JSON-lines logs.
//!
//! # High-Level API
//!
//! ```ignore
//! use fleetwatch::server::{IngestService, IngestServiceConfig};
//! use fleetwatch::fleet::FleetStateProvider;
//!
//! let service = IngestService::start(IngestServiceConfig::default()).await?;
//! let fleet = service.fleet();
//! println!("{} reports so far", fleet.fleet_count());
//!
//! service.shutdown().await;
//! ```

pub mod codec;
pub mod config;
pub mod fleet;
pub mod ingest;
pub mod logging;
pub mod server;
