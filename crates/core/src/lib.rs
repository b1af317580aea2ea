//! This crate is the plumbing layer for the [OpenCTM](https://crates.io/crates/openctm) codec:
//! the typed views the codec uses to touch caller-owned mesh memory, and the little-endian
//! primitive framing every OpenCTM stream is built from.
//!
//! Nothing here knows about compression methods or the container layout; that lives in the
//! `openctm` crate.

#![deny(unused_crate_dependencies)]

pub mod array;
pub mod stream;

// Prelude, for convenience
pub mod prelude;
