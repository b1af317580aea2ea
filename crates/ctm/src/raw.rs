//! The RAW method: every section stored uncompressed, in stream order.
//!
//! RAW exists as a debuggable baseline and as the fallback when compression is not wanted. The
//! body is simply `INDX` (u32 triples), `VERT` (f32 triples), an optional `NORM` section, then
//! one `TEXC` section per UV map and one `ATTR` section per attribute map.

use std::io::{Read, Write};

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{BadFormatSnafu, InternalSnafu, Result};
use crate::export::Exporter;
use crate::format::tags;
use crate::import::Importer;

pub(crate) fn encode<W: Write>(ctx: &Exporter<'_>, writer: &mut StreamWriter<W>) -> Result<()> {
    let Some(vertices) = &ctx.vertices else { return InternalSnafu.fail() };
    let Some(indices) = &ctx.indices else { return InternalSnafu.fail() };
    let vertex_count = vertices.len();
    let triangle_count = indices.len();

    log::debug!("RAW indices: {} bytes", triangle_count * 3 * 4);
    writer.write_tag(tags::INDICES)?;
    for element in 0..triangle_count {
        for corner in 0..3 {
            writer.write_u32(indices.get_i(element, corner))?;
        }
    }

    log::debug!("RAW vertices: {} bytes", vertex_count * 3 * 4);
    writer.write_tag(tags::VERTICES)?;
    for element in 0..vertex_count {
        for component in 0..3 {
            writer.write_f32(vertices.get_f(element, component))?;
        }
    }

    if let Some(normals) = &ctx.normals {
        log::debug!("RAW normals: {} bytes", vertex_count * 3 * 4);
        writer.write_tag(tags::NORMALS)?;
        for element in 0..vertex_count {
            for component in 0..3 {
                writer.write_f32(normals.get_f(element, component))?;
            }
        }
    }

    for map in &ctx.uv_maps {
        log::debug!("RAW UV map {:?}: {} bytes", map.info.name, vertex_count * 2 * 4);
        writer.write_tag(tags::UV_COORDS)?;
        for element in 0..vertex_count {
            for component in 0..2 {
                writer.write_f32(map.array.get_f(element, component))?;
            }
        }
    }

    for map in &ctx.attrib_maps {
        log::debug!("RAW attribute map {:?}: {} bytes", map.info.name, vertex_count * 4 * 4);
        writer.write_tag(tags::ATTRIBS)?;
        for element in 0..vertex_count {
            for component in 0..4 {
                writer.write_f32(map.array.get_f(element, component))?;
            }
        }
    }

    Ok(())
}

pub(crate) fn decode<R: Read>(ctx: &mut Importer<'_>, reader: &mut StreamReader<R>) -> Result<()> {
    let vertex_count = ctx.header.vertex_count as usize;
    let triangle_count = ctx.header.triangle_count as usize;

    ensure!(reader.read_tag()? == tags::INDICES, BadFormatSnafu);
    {
        let Some(indices) = &mut ctx.indices else { return InternalSnafu.fail() };
        for element in 0..triangle_count {
            for corner in 0..3 {
                indices.set_i(element, corner, reader.read_u32()?);
            }
        }
    }

    ensure!(reader.read_tag()? == tags::VERTICES, BadFormatSnafu);
    {
        let Some(vertices) = &mut ctx.vertices else { return InternalSnafu.fail() };
        for element in 0..vertex_count {
            for component in 0..3 {
                vertices.set_f(element, component, reader.read_f32()?);
            }
        }
    }

    if ctx.header.has_normals() {
        ensure!(reader.read_tag()? == tags::NORMALS, BadFormatSnafu);
        match &mut ctx.normals {
            Some(normals) => {
                for element in 0..vertex_count {
                    for component in 0..3 {
                        normals.set_f(element, component, reader.read_f32()?);
                    }
                }
            }
            // Not bound by the caller, consume the section
            None => {
                for _ in 0..vertex_count * 3 {
                    reader.read_f32()?;
                }
            }
        }
    }

    for map in &mut ctx.uv_maps {
        ensure!(reader.read_tag()? == tags::UV_COORDS, BadFormatSnafu);
        match &mut map.array {
            Some(array) => {
                for element in 0..vertex_count {
                    for component in 0..2 {
                        array.set_f(element, component, reader.read_f32()?);
                    }
                }
            }
            None => {
                for _ in 0..vertex_count * 2 {
                    reader.read_f32()?;
                }
            }
        }
    }

    for map in &mut ctx.attrib_maps {
        ensure!(reader.read_tag()? == tags::ATTRIBS, BadFormatSnafu);
        match &mut map.array {
            Some(array) => {
                for element in 0..vertex_count {
                    for component in 0..4 {
                        array.set_f(element, component, reader.read_f32()?);
                    }
                }
            }
            None => {
                for _ in 0..vertex_count * 4 {
                    reader.read_f32()?;
                }
            }
        }
    }

    Ok(())
}
