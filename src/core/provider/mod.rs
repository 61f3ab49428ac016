// src/core/provider/mod.rs

//! Typed client for the cloud VM API and the agent bootstrap payloads.

pub mod client;
pub mod user_data;

pub use client::{FleetClient, LaunchOutcome};
