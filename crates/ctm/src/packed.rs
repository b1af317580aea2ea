//! LZMA-backed packed integer and float arrays, the payload of every MG1/MG2 section.
//!
//! # Format
//! A packed block is always framed the same way:
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | Compressed length | u32 | Byte length of the LZMA payload that follows the props. |
//! | LZMA props | u8\[5] | Standard properties byte plus little-endian dictionary size. |
//! | LZMA payload | u8\[n] | Raw LZMA stream, no end marker needed. |
//!
//! Before compression the values are rearranged so LZMA sees long runs of similar bytes:
//!
//! * **Integers** are regrouped component-major: all component-0 values first, then all
//!   component-1 values, and so on, each value as 4 little-endian two's-complement bytes. The
//!   `signed` flag documents how the values are meant to be interpreted; it does not change the
//!   byte layout.
//! * **Floats** are split into byte planes across the whole block: every value's byte 0, then
//!   every byte 1, then bytes 2 and 3. That groups the exponents together and the low mantissa
//!   bytes together, which is where the compression win comes from on mesh data.
//!
//! The uncompressed size is never stored; both sides know it as `count * size * 4`. The decoder
//! re-frames the payload with the standard 13-byte `.lzma` header (props plus 8-byte length)
//! before handing it to the LZMA backend.

use std::io::{Read, Write};

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{BadFormatSnafu, LzmaSnafu, Result};

/// Compresses a raw block, returning the 5-byte properties header and the payload.
fn compress(bytes: &[u8]) -> Result<([u8; 5], Vec<u8>)> {
    let options = lzma_rs::compress::Options {
        unpacked_size: lzma_rs::compress::UnpackedSize::WriteToHeader(Some(bytes.len() as u64)),
    };
    let mut framed = Vec::new();
    lzma_rs::lzma_compress_with_options(&mut &bytes[..], &mut framed, &options)
        .ok()
        .context(LzmaSnafu)?;
    ensure!(framed.len() >= 13, LzmaSnafu);

    // Strip the .lzma header down to the 5 props bytes; the length is implied by the section
    let payload = framed.split_off(13);
    let mut props = [0u8; 5];
    props.copy_from_slice(&framed[..5]);
    Ok((props, payload))
}

/// Decompresses a payload with the given props into exactly `expected` bytes.
fn decompress(props: [u8; 5], payload: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut framed = Vec::with_capacity(13 + payload.len());
    framed.extend_from_slice(&props);
    framed.extend_from_slice(&(expected as u64).to_le_bytes());
    framed.extend_from_slice(payload);

    let mut bytes = Vec::with_capacity(expected);
    lzma_rs::lzma_decompress(&mut &framed[..], &mut bytes).ok().context(LzmaSnafu)?;
    ensure!(bytes.len() == expected, BadFormatSnafu);
    Ok(bytes)
}

/// Writes one compressed block in the wire framing above.
fn write_block<W: Write>(writer: &mut StreamWriter<W>, bytes: &[u8]) -> Result<()> {
    let (props, payload) = compress(bytes)?;
    writer.write_u32(payload.len() as u32)?;
    writer.write_all(&props)?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Reads one compressed block and expands it to `expected` bytes.
fn read_block<R: Read>(reader: &mut StreamReader<R>, expected: usize) -> Result<Vec<u8>> {
    let length = reader.read_u32()? as usize;
    let mut props = [0u8; 5];
    reader.read_exact(&mut props)?;
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    decompress(props, &payload, expected)
}

/// Writes `count` elements of `size` interleaved integer components as one packed block.
///
/// `signed` documents the value domain of the stream; the serialized bytes are the two's
/// complement form either way.
pub(crate) fn write_packed_ints<W: Write>(
    writer: &mut StreamWriter<W>, data: &[i32], count: usize, size: usize, _signed: bool,
) -> Result<()> {
    debug_assert_eq!(data.len(), count * size);

    // Regroup component-major so each component forms one long, well-behaved byte run
    let mut bytes = Vec::with_capacity(count * size * 4);
    for component in 0..size {
        for element in 0..count {
            bytes.extend_from_slice(&data[element * size + component].to_le_bytes());
        }
    }
    write_block(writer, &bytes)
}

/// Reads one packed block of `count` elements with `size` integer components each.
///
/// # Errors
/// Returns [`BadFormat`](crate::Error::BadFormat) if the block does not expand to exactly
/// `count * size` values, and [`Lzma`](crate::Error::Lzma) if the payload is not a valid
/// LZMA stream.
pub(crate) fn read_packed_ints<R: Read>(
    reader: &mut StreamReader<R>, count: usize, size: usize, _signed: bool,
) -> Result<Vec<i32>> {
    let bytes = read_block(reader, count * size * 4)?;

    let mut data = vec![0i32; count * size];
    for component in 0..size {
        for element in 0..count {
            let offset = (component * count + element) * 4;
            let value =
                i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
            data[element * size + component] = value;
        }
    }
    Ok(data)
}

/// Writes `count * size` floats as one packed block, interleaved into byte planes.
pub(crate) fn write_packed_floats<W: Write>(
    writer: &mut StreamWriter<W>, data: &[f32], count: usize, size: usize,
) -> Result<()> {
    debug_assert_eq!(data.len(), count * size);

    let total = count * size;
    let mut bytes = vec![0u8; total * 4];
    for (index, value) in data.iter().enumerate() {
        for (plane, byte) in value.to_le_bytes().into_iter().enumerate() {
            bytes[plane * total + index] = byte;
        }
    }
    write_block(writer, &bytes)
}

/// Reads one packed block of `count * size` byte-plane interleaved floats.
///
/// # Errors
/// Returns [`BadFormat`](crate::Error::BadFormat) if the block does not expand to exactly
/// `count * size` values, and [`Lzma`](crate::Error::Lzma) if the payload is not a valid
/// LZMA stream.
pub(crate) fn read_packed_floats<R: Read>(
    reader: &mut StreamReader<R>, count: usize, size: usize,
) -> Result<Vec<f32>> {
    let total = count * size;
    let bytes = read_block(reader, total * 4)?;

    let mut data = vec![0f32; total];
    for (index, value) in data.iter_mut().enumerate() {
        *value = f32::from_le_bytes([
            bytes[index],
            bytes[total + index],
            bytes[2 * total + index],
            bytes[3 * total + index],
        ]);
    }
    Ok(data)
}
