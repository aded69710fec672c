//! `hubble-fit` library crate.
//!
//! Estimates the Hubble constant from apparent magnitude, absolute magnitude
//! and redshift measurements, optionally correcting for interstellar
//! extinction.
//!
//! The binary (`hubble`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline can be driven with other observers or datasets

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
