//! Core library for the `trafficgen` CLI.
//!
//! A jobs file describes HTTP request templates; every job instance renders
//! a fresh request per iteration, sends it through its own pooled client
//! and reports traffic volume and request outcomes to a shared metrics
//! sink. The binary wires these pieces to the command line.
pub mod args;
pub mod config;
pub mod entropy;
pub mod error;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod pacing;
pub mod runner;
pub mod shutdown;
pub mod template;
pub mod user_agent;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
