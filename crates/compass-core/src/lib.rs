//! Shared types, configuration and collaborator contracts for the Compass
//! POI discovery assistant.

pub mod config;
pub mod error;
pub mod hours;
pub mod telemetry;
pub mod types;

pub use config::CompassConfig;
pub use error::{CompassError, Result};
pub use hours::{HoursStatus, NextOpening, OpeningHours, UnknownHours};
pub use types::*;
