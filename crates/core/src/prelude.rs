//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! For example, you can refer to [`ArrayRef`], but you have to use [`array::Error`].
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use openctm_core::prelude::*;
//! ```

#[doc(inline)]
pub use crate::array::{ArrayMut, ArrayRef, ElementType, Source, SourceMut};
#[doc(inline)]
pub use crate::stream::{fourcc, StreamReader, StreamWriter};

/// Contains [`array::Error`](crate::array::Error), returned when binding typed array views.
pub mod array {
    pub use crate::array::Error;
}

/// Contains [`stream::Error`](crate::stream::Error), returned by the primitive stream layer.
pub mod stream {
    pub use crate::stream::Error;
}
