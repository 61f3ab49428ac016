// src/core/master/mod.rs

//! Typed client for the build master's remoting HTTP API.

pub mod client;
pub mod slot;

pub use client::MasterClient;
