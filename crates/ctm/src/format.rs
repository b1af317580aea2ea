//! The OpenCTM container framing: magic, version, method tags, flags, and the file header.
//!
//! # Header
//! Every method shares the same header, all values little-endian:
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | Magic number | u8\[4] | `"OCTM"` |
//! | Version | u32 | Currently 6. |
//! | Method | u8\[4] | `"RAW\0"`, `"MG1\0"` or `"MG2\0"`. |
//! | Vertex count | u32 | Must be at least 1. |
//! | Triangle count | u32 | Must be at least 1. |
//! | UV map count | u32 | |
//! | Attribute map count | u32 | |
//! | Flags | u32 | Bit 0 = has normals, the rest reserved as zero. |
//! | Comment | string | Length-prefixed UTF-8, possibly empty. |
//! | Map registry | | Name and texture file name per UV map, name per attribute map. |
//!
//! The body that follows is a sequence of tagged sections whose layout is decided by the method;
//! the decoder knows which tag must come next at every point, and anything else is a format
//! error.

use std::fmt;
use std::io::{Read, Write};

use bitflags::bitflags;
use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{BadFormatSnafu, Error, Result};

/// Unique identifier at the start of every OpenCTM stream.
pub const MAGIC: [u8; 4] = *b"OCTM";

/// The container version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 6;

/// Upper bound on maps of one kind; counts beyond this are treated as corruption.
pub const MAX_MAPS: usize = 32;

/// Body section tags.
pub(crate) mod tags {
    pub const INDICES: [u8; 4] = *b"INDX";
    pub const VERTICES: [u8; 4] = *b"VERT";
    pub const NORMALS: [u8; 4] = *b"NORM";
    pub const UV_COORDS: [u8; 4] = *b"TEXC";
    pub const ATTRIBS: [u8; 4] = *b"ATTR";
    pub const GRID_INDICES: [u8; 4] = *b"GIDX";
    pub const MG2_HEADER: [u8; 4] = *b"MG2H";
}

bitflags! {
    /// The header flags word. All bits other than the ones below are reserved and written as
    /// zero; readers ignore them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u32 {
        const HAS_NORMALS = 0x0000_0001;
    }
}

/// The compression method of a stream. A closed set: decoders reject anything else up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Uncompressed sections, for debugging and as a fallback.
    Raw,
    /// Lossless: triangle reordering, index deltas, and LZMA-packed sections.
    Mg1,
    /// Lossy: grid-sorted quantized vertices, predicted normals, delta-coded maps.
    Mg2,
}

impl Method {
    /// The four-character tag this method is stored as.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> [u8; 4] {
        match self {
            Self::Raw => *b"RAW\0",
            Self::Mg1 => *b"MG1\0",
            Self::Mg2 => *b"MG2\0",
        }
    }

    /// Looks up the method for a header tag.
    #[inline]
    #[must_use]
    pub fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"RAW\0" => Some(Self::Raw),
            b"MG1\0" => Some(Self::Mg1),
            b"MG2\0" => Some(Self::Mg2),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "RAW",
            Self::Mg1 => "MG1",
            Self::Mg2 => "MG2",
        })
    }
}

/// Registry entry for one UV or attribute map: the identity data that lives in the container
/// header rather than in the map's body section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    /// Unique name within the map's list.
    pub name: String,
    /// Optional texture file reference. Only meaningful for UV maps.
    pub file_name: Option<String>,
}

/// The parsed container header of an OpenCTM stream.
#[derive(Debug, Clone)]
pub struct Header {
    pub method: Method,
    pub vertex_count: u32,
    pub triangle_count: u32,
    pub flags: HeaderFlags,
    pub comment: Option<String>,
    pub uv_maps: Vec<MapInfo>,
    pub attrib_maps: Vec<MapInfo>,
}

impl Header {
    /// Returns whether the stream carries a normal section.
    #[inline]
    #[must_use]
    pub const fn has_normals(&self) -> bool {
        self.flags.contains(HeaderFlags::HAS_NORMALS)
    }

    /// Reads and validates a container header.
    ///
    /// # Errors
    /// Returns [`BadFormat`](Error::BadFormat) for a wrong magic number, unknown method tag,
    /// zero counts, implausible map counts or duplicate map names,
    /// [`UnsupportedFormatVersion`](Error::UnsupportedFormatVersion) for any version other than
    /// [`FORMAT_VERSION`], and [`FileError`](Error::FileError) if the stream ends early.
    pub fn read<R: Read>(reader: &mut StreamReader<R>) -> Result<Self> {
        ensure!(reader.read_tag()? == MAGIC, BadFormatSnafu);

        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion { version });
        }

        let method = Method::from_tag(reader.read_tag()?).context(BadFormatSnafu)?;

        let vertex_count = reader.read_u32()?;
        ensure!(vertex_count >= 1, BadFormatSnafu);
        let triangle_count = reader.read_u32()?;
        ensure!(triangle_count >= 1, BadFormatSnafu);

        let uv_map_count = reader.read_u32()? as usize;
        let attrib_map_count = reader.read_u32()? as usize;
        ensure!(uv_map_count <= MAX_MAPS && attrib_map_count <= MAX_MAPS, BadFormatSnafu);

        let flags = HeaderFlags::from_bits_truncate(reader.read_u32()?);

        let comment = reader.read_string()?;
        let comment = (!comment.is_empty()).then_some(comment);

        let mut uv_maps = Vec::new();
        for _ in 0..uv_map_count {
            let name = reader.read_string()?;
            let file_name = reader.read_string()?;
            uv_maps.push(MapInfo { name, file_name: (!file_name.is_empty()).then_some(file_name) });
        }
        let mut attrib_maps = Vec::new();
        for _ in 0..attrib_map_count {
            let name = reader.read_string()?;
            attrib_maps.push(MapInfo { name, file_name: None });
        }
        ensure!(unique_names(&uv_maps) && unique_names(&attrib_maps), BadFormatSnafu);

        Ok(Self { method, vertex_count, triangle_count, flags, comment, uv_maps, attrib_maps })
    }

    /// Writes the container header, including the map registry.
    ///
    /// # Errors
    /// Returns [`FileError`](Error::FileError) if the stream refuses bytes.
    pub fn write<W: Write>(&self, writer: &mut StreamWriter<W>) -> Result<()> {
        writer.write_tag(MAGIC)?;
        writer.write_u32(FORMAT_VERSION)?;
        writer.write_tag(self.method.tag())?;
        writer.write_u32(self.vertex_count)?;
        writer.write_u32(self.triangle_count)?;
        writer.write_u32(self.uv_maps.len() as u32)?;
        writer.write_u32(self.attrib_maps.len() as u32)?;
        writer.write_u32(self.flags.bits())?;
        writer.write_string(self.comment.as_deref())?;
        for map in &self.uv_maps {
            writer.write_string(Some(&map.name))?;
            writer.write_string(map.file_name.as_deref())?;
        }
        for map in &self.attrib_maps {
            writer.write_string(Some(&map.name))?;
        }
        Ok(())
    }
}

/// Checks that no name occurs twice within one map list.
pub(crate) fn unique_names(maps: &[MapInfo]) -> bool {
    maps.iter()
        .enumerate()
        .all(|(i, map)| maps[..i].iter().all(|earlier| earlier.name != map.name))
}
