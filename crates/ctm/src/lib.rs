//! Codec for [OpenCTM](http://openctm.sourceforge.net/), a compact binary container for
//! triangle meshes: positions, a triangle index list, and optional per-vertex normals, UV sets,
//! and custom float attribute sets.
//!
//! # Methods
//! A stream is written with one of three interchangeable compression methods that share the
//! same container header:
//!
//! * **RAW** — everything uncompressed, as a debuggable baseline.
//! * **MG1** — lossless: canonicalized triangle order, delta-coded indices, LZMA-packed
//!   sections.
//! * **MG2** — lossy: vertices quantized to a configurable precision and sorted through a
//!   spatial grid, normals stored against a smooth-normal prediction, everything delta-coded
//!   before packing.
//!
//! # Usage
//! Three levels of API, from convenient to precise:
//!
//! * [`Mesh`] owns its storage and reads/writes whole meshes in one call.
//! * [`Exporter`] and [`Importer`] borrow caller memory through typed, strided views
//!   ([`array::ArrayRef`]/[`array::ArrayMut`]), so interleaved vertex buffers of any supported
//!   element type can be encoded or filled in place, without copies.
//! * [`format::Header`] exposes the raw container header for tooling that only inspects.
//!
//! Decoding picks the method from the stream header; nothing about a context has to match the
//! file being read. Each context is single-threaded; independent contexts are freely usable
//! from different threads.

#![deny(unused_crate_dependencies)]

pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod mesh;

mod mg1;
mod mg2;
mod packed;
mod raw;
mod validate;

// The typed array views live in the plumbing crate; callers need them to bind buffers
pub use openctm_core::array;

pub use crate::error::{Error, Result};
pub use crate::export::{AttribMapId, Exporter, UvMapId};
pub use crate::format::Method;
pub use crate::import::Importer;
pub use crate::mesh::{AttribMap, Mesh, SaveOptions, UvMap};

// Prelude, for convenience
pub mod prelude;
