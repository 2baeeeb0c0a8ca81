//! OUTLOOK: session-driven market outlook scoring.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod analysis;
pub mod data;
pub mod report;
pub mod storage;
pub mod runner;
pub mod server;
