//! Core type definitions for Guardian.
//!
//! This crate defines the fundamental types shared between the ingest
//! protocol core and its transports:
//! - the opaque device identity token
//! - the telemetry data kinds
//!
//! Wire message shapes and payload schemas belong in `guardian-ingest`,
//! not here.

mod ids;
mod kind;

pub use ids::DeviceIdentity;
pub use kind::DataKind;
