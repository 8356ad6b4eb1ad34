//! Core library for the Wayfarer gear planner.

pub mod catalog;
pub mod character;
pub mod database;
pub mod error;
pub mod gearset;
pub mod history;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod quality;
pub mod stats;
pub mod travel;

pub use error::{Result, WayfarerError};
pub use gearset::{decode_gearset, encode_gearset, GearSlot, Gearset, Quality};
