//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use openctm::prelude::*;
//! ```

#[doc(inline)]
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::export::{AttribMapId, Exporter, UvMapId};
#[doc(inline)]
pub use crate::format::{Header, HeaderFlags, MapInfo, Method};
#[doc(inline)]
pub use crate::import::Importer;
#[doc(inline)]
pub use crate::mesh::{AttribMap, Mesh, SaveOptions, UvMap};
pub use openctm_core::array::{ArrayMut, ArrayRef, ElementType};
