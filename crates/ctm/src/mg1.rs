//! The MG1 method: lossless compression.
//!
//! MG1 keeps every value bit-exact and still compresses well by making the data easier for LZMA:
//!
//! 1. Triangles are rotated so the smallest corner index comes first (a cyclic rotation, so the
//!    winding survives), then sorted by first and second index. The triangle *set* is unchanged,
//!    only its order is canonicalized.
//! 2. The sorted index list is delta-coded (see [`make_index_deltas`]).
//! 3. Every section goes through the packed-array codec instead of being stored raw.
//!
//! Vertex data stays in the caller's order; only the index list is rewritten. MG2 reuses the
//! triangle treatment on top of its spatial vertex sort.

use std::io::{Read, Write};

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{BadFormatSnafu, InternalSnafu, InvalidMeshSnafu, Result};
use crate::export::Exporter;
use crate::format::tags;
use crate::import::Importer;
use crate::packed;

/// Rotates each triangle so its smallest index leads, then sorts the list by first index with
/// the second index as tie breaker.
pub(crate) fn rearrange_triangles(triangles: &mut [[u32; 3]]) {
    for triangle in triangles.iter_mut() {
        if triangle[1] < triangle[0] && triangle[1] < triangle[2] {
            *triangle = [triangle[1], triangle[2], triangle[0]];
        } else if triangle[2] < triangle[0] && triangle[2] < triangle[1] {
            *triangle = [triangle[2], triangle[0], triangle[1]];
        }
    }
    triangles.sort_by(|a, b| a[0].cmp(&b[0]).then(a[1].cmp(&b[1])));
}

/// Delta-codes a sorted triangle list in place, right to left.
///
/// Per triangle: the second index becomes a delta against the previous triangle's second index
/// when both share a first index (fan configurations), otherwise against the own first index;
/// the third index becomes a delta against the own first index; the first index becomes a delta
/// against the previous first index. Wrapping arithmetic, the inverse restores bit-exactly.
pub(crate) fn make_index_deltas(triangles: &mut [[u32; 3]]) {
    for element in (0..triangles.len()).rev() {
        let previous = element.checked_sub(1).map(|p| triangles[p]);
        let triangle = &mut triangles[element];

        match previous {
            Some(previous) if previous[0] == triangle[0] => {
                triangle[1] = triangle[1].wrapping_sub(previous[1]);
            }
            _ => triangle[1] = triangle[1].wrapping_sub(triangle[0]),
        }

        triangle[2] = triangle[2].wrapping_sub(triangle[0]);

        if let Some(previous) = previous {
            triangle[0] = triangle[0].wrapping_sub(previous[0]);
        }
    }
}

/// Undoes [`make_index_deltas`], left to right, mirroring the delta order.
pub(crate) fn restore_index_deltas(triangles: &mut [[u32; 3]]) {
    for element in 0..triangles.len() {
        let previous = element.checked_sub(1).map(|p| triangles[p]);
        let triangle = &mut triangles[element];

        if let Some(previous) = previous {
            triangle[0] = triangle[0].wrapping_add(previous[0]);
        }

        triangle[2] = triangle[2].wrapping_add(triangle[0]);

        match previous {
            Some(previous) if previous[0] == triangle[0] => {
                triangle[1] = triangle[1].wrapping_add(previous[1]);
            }
            _ => triangle[1] = triangle[1].wrapping_add(triangle[0]),
        }
    }
}

/// Collects a triangle list through the bound index view.
pub(crate) fn collect_triangles(indices: &ArrayRef<'_>) -> Vec<[u32; 3]> {
    (0..indices.len())
        .map(|element| {
            [indices.get_i(element, 0), indices.get_i(element, 1), indices.get_i(element, 2)]
        })
        .collect()
}

/// Flattens a triangle list into the i32 layout the packed-int codec takes.
pub(crate) fn flatten_triangles(triangles: &[[u32; 3]]) -> Vec<i32> {
    triangles.iter().flat_map(|triangle| triangle.iter().map(|&index| index as i32)).collect()
}

pub(crate) fn encode<W: Write>(ctx: &Exporter<'_>, writer: &mut StreamWriter<W>) -> Result<()> {
    let Some(vertices) = &ctx.vertices else { return InternalSnafu.fail() };
    let Some(indices) = &ctx.indices else { return InternalSnafu.fail() };
    let vertex_count = vertices.len();
    let triangle_count = indices.len();

    let mut triangles = collect_triangles(indices);
    rearrange_triangles(&mut triangles);
    make_index_deltas(&mut triangles);

    log::debug!("MG1 indices: {triangle_count} triangles");
    writer.write_tag(tags::INDICES)?;
    packed::write_packed_ints(writer, &flatten_triangles(&triangles), triangle_count, 3, false)?;

    log::debug!("MG1 vertices: {vertex_count} vertices");
    let mut scratch = Vec::with_capacity(vertex_count * 3);
    for element in 0..vertex_count {
        for component in 0..3 {
            scratch.push(vertices.get_f(element, component));
        }
    }
    writer.write_tag(tags::VERTICES)?;
    packed::write_packed_floats(writer, &scratch, vertex_count, 3)?;

    if let Some(normals) = &ctx.normals {
        log::debug!("MG1 normals: {vertex_count} vertices");
        scratch.clear();
        for element in 0..vertex_count {
            for component in 0..3 {
                scratch.push(normals.get_f(element, component));
            }
        }
        writer.write_tag(tags::NORMALS)?;
        packed::write_packed_floats(writer, &scratch, vertex_count, 3)?;
    }

    for map in &ctx.uv_maps {
        log::debug!("MG1 UV map {:?}", map.info.name);
        scratch.clear();
        for element in 0..vertex_count {
            for component in 0..2 {
                scratch.push(map.array.get_f(element, component));
            }
        }
        writer.write_tag(tags::UV_COORDS)?;
        packed::write_packed_floats(writer, &scratch, vertex_count, 2)?;
    }

    for map in &ctx.attrib_maps {
        log::debug!("MG1 attribute map {:?}", map.info.name);
        scratch.clear();
        for element in 0..vertex_count {
            for component in 0..4 {
                scratch.push(map.array.get_f(element, component));
            }
        }
        writer.write_tag(tags::ATTRIBS)?;
        packed::write_packed_floats(writer, &scratch, vertex_count, 4)?;
    }

    Ok(())
}

pub(crate) fn decode<R: Read>(ctx: &mut Importer<'_>, reader: &mut StreamReader<R>) -> Result<()> {
    let vertex_count = ctx.header.vertex_count as usize;
    let triangle_count = ctx.header.triangle_count as usize;

    ensure!(reader.read_tag()? == tags::INDICES, BadFormatSnafu);
    let deltas = packed::read_packed_ints(reader, triangle_count, 3, false)?;
    let mut triangles: Vec<[u32; 3]> = deltas
        .chunks_exact(3)
        .map(|corners| [corners[0] as u32, corners[1] as u32, corners[2] as u32])
        .collect();
    restore_index_deltas(&mut triangles);
    {
        let Some(indices) = &mut ctx.indices else { return InternalSnafu.fail() };
        for (element, triangle) in triangles.iter().enumerate() {
            for (corner, &index) in triangle.iter().enumerate() {
                ensure!((index as usize) < vertex_count, InvalidMeshSnafu);
                indices.set_i(element, corner, index);
            }
        }
    }

    ensure!(reader.read_tag()? == tags::VERTICES, BadFormatSnafu);
    let values = packed::read_packed_floats(reader, vertex_count, 3)?;
    {
        let Some(vertices) = &mut ctx.vertices else { return InternalSnafu.fail() };
        for element in 0..vertex_count {
            for component in 0..3 {
                vertices.set_f(element, component, values[element * 3 + component]);
            }
        }
    }

    if ctx.header.has_normals() {
        ensure!(reader.read_tag()? == tags::NORMALS, BadFormatSnafu);
        let values = packed::read_packed_floats(reader, vertex_count, 3)?;
        if let Some(normals) = &mut ctx.normals {
            for element in 0..vertex_count {
                for component in 0..3 {
                    normals.set_f(element, component, values[element * 3 + component]);
                }
            }
        }
    }

    for map in &mut ctx.uv_maps {
        ensure!(reader.read_tag()? == tags::UV_COORDS, BadFormatSnafu);
        let values = packed::read_packed_floats(reader, vertex_count, 2)?;
        if let Some(array) = &mut map.array {
            for element in 0..vertex_count {
                for component in 0..2 {
                    array.set_f(element, component, values[element * 2 + component]);
                }
            }
        }
    }

    for map in &mut ctx.attrib_maps {
        ensure!(reader.read_tag()? == tags::ATTRIBS, BadFormatSnafu);
        let values = packed::read_packed_floats(reader, vertex_count, 4)?;
        if let Some(array) = &mut map.array {
            for element in 0..vertex_count {
                for component in 0..4 {
                    array.set_f(element, component, values[element * 4 + component]);
                }
            }
        }
    }

    Ok(())
}
