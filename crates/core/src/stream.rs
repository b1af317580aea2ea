//! Little-endian primitive framing over a caller-supplied byte stream.
//!
//! Every multi-byte value in an OpenCTM stream is little-endian, independent of the host, and the
//! body of a file is delimited by four-character tags. This module wraps any [`Read`]/[`Write`]
//! implementation with the four primitives the container is built from:
//!
//! | Primitive | Layout |
//! |-----------|--------|
//! | `u32` | 4 bytes, little-endian |
//! | `f32` | IEEE-754 binary32 bit pattern, little-endian |
//! | string | `u32` byte length, then that many UTF-8 bytes, no terminator |
//! | tag | 4 ASCII bytes, stored as if a little-endian `u32` with byte 0 first |
//!
//! A short read or write from the underlying stream is end-of-stream (or a write failure) and
//! surfaces as [`Error::File`], which aborts whatever operation was in flight.

use std::io::{Read, Write};

use snafu::prelude::*;

/// Strings above this length are treated as stream corruption rather than honored.
const MAX_STRING_BYTES: u32 = 0x0010_0000;

/// Error conditions for reading/writing stream primitives.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Thrown if the underlying stream fails or comes up short.
    #[snafu(transparent)]
    File { source: std::io::Error },
    /// Thrown if a string field is not valid UTF-8.
    #[snafu(display("String field is not valid UTF-8!"))]
    InvalidUtf8,
    /// Thrown if a string length prefix is beyond any plausible field size.
    #[snafu(display("String field length {length:#x} is not plausible!"))]
    StringTooLong { length: u32 },
}
type Result<T> = core::result::Result<T, Error>;

/// Packs a four-character tag into its little-endian `u32` form.
#[inline]
#[must_use]
pub const fn fourcc(tag: [u8; 4]) -> u32 {
    u32::from_le_bytes(tag)
}

/// Reads OpenCTM primitives from a byte stream.
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
}

impl<R: Read> StreamReader<R> {
    /// Wraps a byte stream for primitive reads.
    #[inline]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads exactly `buf.len()` bytes.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or ends early.
    #[inline]
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or ends early.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.inner.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a little-endian IEEE-754 `f32`.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or ends early.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        let mut bytes = [0u8; 4];
        self.inner.read_exact(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    /// Reads a four-character tag.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or ends early.
    #[inline]
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let mut tag = [0u8; 4];
        self.inner.read_exact(&mut tag)?;
        Ok(tag)
    }

    /// Reads a length-prefixed UTF-8 string. Empty strings are legal.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) on stream failure, [`InvalidUtf8`](Error::InvalidUtf8) if
    /// the bytes are not UTF-8, and [`StringTooLong`](Error::StringTooLong) for a length prefix
    /// that cannot be an honest string field.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_u32()?;
        ensure!(length <= MAX_STRING_BYTES, StringTooLongSnafu { length });

        let mut bytes = vec![0u8; length as usize];
        self.inner.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}

/// Writes OpenCTM primitives to a byte stream.
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
}

impl<W: Write> StreamWriter<W> {
    /// Wraps a byte stream for primitive writes.
    #[inline]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes a raw run of bytes.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or refuses bytes.
    #[inline]
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Writes a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or refuses bytes.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Writes a little-endian IEEE-754 `f32`.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or refuses bytes.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Writes a four-character tag.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or refuses bytes.
    #[inline]
    pub fn write_tag(&mut self, tag: [u8; 4]) -> Result<()> {
        self.inner.write_all(&tag)?;
        Ok(())
    }

    /// Writes a length-prefixed UTF-8 string, with `None` encoded as the empty string.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails or refuses bytes.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        let bytes = value.unwrap_or_default().as_bytes();
        self.write_u32(bytes.len() as u32)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Flushes the underlying stream.
    ///
    /// # Errors
    /// Returns [`File`](Error::File) if the stream fails to flush.
    #[inline]
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
