//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod gate;
pub mod http;
pub mod memory;
pub mod notify;
pub mod telemetry;
