//! Core library for the `cipstress` CLI.
//!
//! This crate provides the building blocks used by the binary: the CIP
//! client abstraction and its in-process emulated adapter, the scenario
//! execution engine and registry, the streaming metrics aggregator, and the
//! artifact writers. The primary user-facing interface is the `cipstress`
//! command-line application; library APIs may evolve as the CLI grows.
pub mod args;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod scenarios;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod sinks;
