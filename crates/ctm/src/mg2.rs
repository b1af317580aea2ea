//! The MG2 method: lossy, grid-sorted, delta-coded compression.
//!
//! MG2 quantizes positions to a fixed precision inside a 3D space-subdivision grid, sorts
//! vertices by grid cell, and stores everything as small integer deltas that the packed-int
//! codec squeezes down. Normals are stored relative to a *predicted* smooth normal per vertex,
//! which both sides compute from the reconstructed (post-quantization) positions so that the
//! encoder and decoder agree bit for bit.
//!
//! # Body layout
//!
//! | Section | Payload |
//! |---------|---------|
//! | `MG2H` | Vertex and normal precision, grid bounding box, per-axis division counts. |
//! | `VERT` | Packed ints, 3 per vertex: quantized offsets from the grid cell origin, with the x component chained within a cell. |
//! | `GIDX` | Packed ints, 1 per vertex: grid cell index deltas (mostly zero after the sort). |
//! | `INDX` | Packed ints, 3 per triangle: re-indexed, rotated, sorted, delta-coded corners. |
//! | `NORM` | Packed ints, 3 per vertex: magnitude, phi, theta against the predicted normal. Only with normals. |
//! | `TEXC` | Per UV map: f32 precision, then packed ints, 2 per vertex, consecutive deltas. |
//! | `ATTR` | Per attribute map: f32 precision, then packed ints, 4 per vertex. |

use std::io::{Read, Write};

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{BadFormatSnafu, InternalSnafu, InvalidMeshSnafu, Result};
use crate::export::Exporter;
use crate::format::tags;
use crate::import::Importer;
use crate::mg1::{
    collect_triangles, flatten_triangles, make_index_deltas, rearrange_triangles,
    restore_index_deltas,
};
use crate::packed;

use core::f32::consts::PI;

/// The first vertex of a stream never chains; this sentinel can still appear as a real cell
/// index, which is harmless because the running x delta starts at zero.
const NO_PREVIOUS_CELL: u32 = 0x7fff_ffff;

/// Rounds to the nearest integer, halves up, matching the quantization the format is built on.
#[inline]
fn quantize(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// The 3D space-subdivision grid: an axis-aligned box cut into at least one cell per axis.
#[derive(Debug, Clone)]
struct Grid {
    min: [f32; 3],
    max: [f32; 3],
    division: [u32; 3],
    size: [f32; 3],
}

impl Grid {
    /// Computes the mesh bounding box and picks a grid resolution from the vertex count and the
    /// box proportions. The resolution is a heuristic only: it is stored in the header, so any
    /// choice decodes correctly.
    fn setup(vertices: &ArrayRef<'_>) -> Self {
        let mut min = [0f32; 3];
        let mut max = [0f32; 3];
        for component in 0..3 {
            min[component] = vertices.get_f(0, component);
            max[component] = min[component];
        }
        for element in 1..vertices.len() {
            for component in 0..3 {
                let value = vertices.get_f(element, component);
                if value < min[component] {
                    min[component] = value;
                } else if value > max[component] {
                    max[component] = value;
                }
            }
        }

        let mut factor = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
        let sum = factor[0] + factor[1] + factor[2];
        let mut division = [4u32; 3];
        if sum > 1e-30 {
            let scale = 1.0 / sum;
            let wanted = (100.0 * vertices.len() as f32).powf(1.0 / 3.0);
            for component in 0..3 {
                factor[component] *= scale;
                division[component] = ((wanted * factor[component]).ceil() as u32).max(1);
            }
        }

        let mut grid = Self { min, max, division, size: [0.0; 3] };
        grid.update_sizes();
        grid
    }

    fn update_sizes(&mut self) {
        for component in 0..3 {
            self.size[component] =
                (self.max[component] - self.min[component]) / self.division[component] as f32;
        }
    }

    /// Maps a point to its cell index, clamping onto the boundary cells.
    fn cell_of(&self, point: [f32; 3]) -> u32 {
        let mut index = [0u32; 3];
        for component in 0..3 {
            let slot = ((point[component] - self.min[component]) / self.size[component]).floor()
                as u32;
            index[component] = slot.min(self.division[component] - 1);
        }
        index[0]
            .wrapping_add(self.division[0].wrapping_mul(
                index[1].wrapping_add(self.division[1].wrapping_mul(index[2])),
            ))
    }

    /// Maps a cell index back to the min corner of its box.
    fn origin_of(&self, cell: u32) -> [f32; 3] {
        let x_div = u64::from(self.division[0]);
        let z_div = x_div * u64::from(self.division[1]);

        let cell = u64::from(cell);
        let slot_z = cell / z_div;
        let rest = cell - slot_z * z_div;
        let slot_y = rest / x_div;
        let slot_x = rest - slot_y * x_div;

        [
            slot_x as f32 * self.size[0] + self.min[0],
            slot_y as f32 * self.size[1] + self.min[1],
            slot_z as f32 * self.size[2] + self.min[2],
        ]
    }

    fn write<W: Write>(&self, writer: &mut StreamWriter<W>) -> Result<()> {
        for component in 0..3 {
            writer.write_f32(self.min[component])?;
        }
        for component in 0..3 {
            writer.write_f32(self.max[component])?;
        }
        for component in 0..3 {
            writer.write_u32(self.division[component])?;
        }
        Ok(())
    }

    fn read<R: Read>(reader: &mut StreamReader<R>) -> Result<Self> {
        let mut grid = Self { min: [0.0; 3], max: [0.0; 3], division: [0; 3], size: [0.0; 3] };
        for component in 0..3 {
            grid.min[component] = reader.read_f32()?;
        }
        for component in 0..3 {
            grid.max[component] = reader.read_f32()?;
            ensure!(grid.max[component] >= grid.min[component], BadFormatSnafu);
        }
        for component in 0..3 {
            grid.division[component] = reader.read_u32()?;
            ensure!(grid.division[component] >= 1, BadFormatSnafu);
        }
        grid.update_sizes();
        Ok(grid)
    }
}

/// One vertex prepared for the spatial sort.
#[derive(Debug, Clone, Copy)]
struct SortVertex {
    /// X coordinate, the tie breaker within a cell.
    x: f32,
    cell: u32,
    original_index: u32,
}

/// Assigns every vertex to a grid cell and sorts by cell, then by x.
fn sort_vertices(vertices: &ArrayRef<'_>, grid: &Grid) -> Vec<SortVertex> {
    let mut sorted: Vec<SortVertex> = (0..vertices.len())
        .map(|element| {
            let point = [
                vertices.get_f(element, 0),
                vertices.get_f(element, 1),
                vertices.get_f(element, 2),
            ];
            SortVertex { x: point[0], cell: grid.cell_of(point), original_index: element as u32 }
        })
        .collect();
    sorted.sort_by(|a, b| a.cell.cmp(&b.cell).then_with(|| a.x.total_cmp(&b.x)));
    sorted
}

/// Quantizes sorted vertices against their cell origins. The x component additionally chains to
/// the previous vertex while the cell stays the same, which is what the sort set up.
fn make_vertex_deltas(
    vertices: &ArrayRef<'_>, sorted: &[SortVertex], grid: &Grid, precision: f32,
) -> Vec<i32> {
    let scale = 1.0 / precision;
    let mut output = vec![0i32; sorted.len() * 3];

    let mut previous_cell = NO_PREVIOUS_CELL;
    let mut previous_dx = 0i32;
    for (element, vertex) in sorted.iter().enumerate() {
        let origin = grid.origin_of(vertex.cell);
        let original = vertex.original_index as usize;

        let dx = quantize(scale * (vertices.get_f(original, 0) - origin[0]));
        output[element * 3] =
            if vertex.cell == previous_cell { dx.wrapping_sub(previous_dx) } else { dx };
        output[element * 3 + 1] = quantize(scale * (vertices.get_f(original, 1) - origin[1]));
        output[element * 3 + 2] = quantize(scale * (vertices.get_f(original, 2) - origin[2]));

        previous_cell = vertex.cell;
        previous_dx = dx;
    }
    output
}

/// Reconstructs vertex positions from quantized deltas and the per-vertex cell indices.
///
/// The encoder runs this too: everything derived from positions afterwards (most importantly
/// the smooth-normal prediction) must see the decoder's values, not the source ones.
fn restore_vertices(
    int_vertices: &[i32], cells: &[u32], grid: &Grid, precision: f32,
) -> Vec<f32> {
    let mut output = vec![0f32; int_vertices.len()];

    let mut previous_cell = NO_PREVIOUS_CELL;
    let mut previous_dx = 0i32;
    for (element, &cell) in cells.iter().enumerate() {
        let origin = grid.origin_of(cell);

        let mut dx = int_vertices[element * 3];
        if cell == previous_cell {
            dx = dx.wrapping_add(previous_dx);
        }
        output[element * 3] = precision * dx as f32 + origin[0];
        output[element * 3 + 1] = precision * int_vertices[element * 3 + 1] as f32 + origin[1];
        output[element * 3 + 2] = precision * int_vertices[element * 3 + 2] as f32 + origin[2];

        previous_cell = cell;
        previous_dx = dx;
    }
    output
}

/// Computes the per-vertex smooth normals that serve as the prediction for normal coding: the
/// normalized sum of the flat normals of every triangle touching the vertex.
fn calc_smooth_normals(
    vertex_count: usize, vertices: &[f32], triangles: &[[u32; 3]],
) -> Vec<f32> {
    let mut smooth = vec![0f32; vertex_count * 3];

    for triangle in triangles {
        let [a, b, c] = [
            triangle[0] as usize * 3,
            triangle[1] as usize * 3,
            triangle[2] as usize * 3,
        ];
        let edge1 = [
            vertices[b] - vertices[a],
            vertices[b + 1] - vertices[a + 1],
            vertices[b + 2] - vertices[a + 2],
        ];
        let edge2 = [
            vertices[c] - vertices[a],
            vertices[c + 1] - vertices[a + 1],
            vertices[c + 2] - vertices[a + 2],
        ];
        let mut normal = [
            edge1[1] * edge2[2] - edge1[2] * edge2[1],
            edge1[2] * edge2[0] - edge1[0] * edge2[2],
            edge1[0] * edge2[1] - edge1[1] * edge2[0],
        ];
        let length = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        let scale = if length > 1e-10 { 1.0 / length } else { 1.0 };
        for component in &mut normal {
            *component *= scale;
        }

        for &corner in &[a, b, c] {
            smooth[corner] += normal[0];
            smooth[corner + 1] += normal[1];
            smooth[corner + 2] += normal[2];
        }
    }

    for element in 0..vertex_count {
        let slot = element * 3;
        let length = (smooth[slot] * smooth[slot]
            + smooth[slot + 1] * smooth[slot + 1]
            + smooth[slot + 2] * smooth[slot + 2])
            .sqrt();
        let scale = if length > 1e-10 { 1.0 / length } else { 1.0 };
        smooth[slot] *= scale;
        smooth[slot + 1] *= scale;
        smooth[slot + 2] *= scale;
    }

    smooth
}

/// Builds the orthonormal basis whose z axis is the given unit normal.
///
/// The exact construction is part of the wire contract: a different orthogonal complement would
/// decode other writers' files into wrong normals. x is `(0,0,1) x n + (1,0,0) x n`, which is
/// orthogonal to n, nonzero away from the poles, and a continuous function of n.
fn make_normal_coord_sys(normal: [f32; 3]) -> [[f32; 3]; 3] {
    let z = normal;
    let mut x = [-normal[1], normal[0] - normal[2], normal[1]];

    let length = (2.0 * x[0] * x[0] + x[1] * x[1]).sqrt();
    if length > 1.0e-20 {
        let scale = 1.0 / length;
        x[0] *= scale;
        x[1] *= scale;
        x[2] *= scale;
    }

    let y = [
        z[1] * x[2] - z[2] * x[1],
        z[2] * x[0] - z[0] * x[2],
        z[0] * x[1] - z[1] * x[0],
    ];
    [x, y, z]
}

/// Converts the source normals into (magnitude, phi, theta) integers relative to the smooth
/// normal prediction computed from `restored_vertices` and the sorted index list.
fn make_normal_deltas(
    normals: &ArrayRef<'_>, sorted: &[SortVertex], restored_vertices: &[f32],
    triangles: &[[u32; 3]], precision: f32,
) -> Vec<i32> {
    let vertex_count = sorted.len();
    let smooth = calc_smooth_normals(vertex_count, restored_vertices, triangles);
    let scale = 1.0 / precision;

    let mut output = vec![0i32; vertex_count * 3];
    for (element, vertex) in sorted.iter().enumerate() {
        let original = vertex.original_index as usize;
        let n0 = [
            normals.get_f(original, 0),
            normals.get_f(original, 1),
            normals.get_f(original, 2),
        ];
        let prediction =
            [smooth[element * 3], smooth[element * 3 + 1], smooth[element * 3 + 2]];

        let mut magnitude = (n0[0] * n0[0] + n0[1] * n0[1] + n0[2] * n0[2]).sqrt();
        if magnitude < 1e-10 {
            magnitude = 1.0;
        }
        // A flip against the prediction is recorded in the magnitude's sign
        if prediction[0] * n0[0] + prediction[1] * n0[1] + prediction[2] * n0[2] < 0.0 {
            magnitude = -magnitude;
        }
        output[element * 3] = quantize(scale * magnitude);

        let inverse = 1.0 / magnitude;
        let unit = [n0[0] * inverse, n0[1] * inverse, n0[2] * inverse];

        // Express the normal in the prediction's frame and go spherical
        let basis = make_normal_coord_sys(prediction);
        let rotated = [
            basis[0][0] * unit[0] + basis[0][1] * unit[1] + basis[0][2] * unit[2],
            basis[1][0] * unit[0] + basis[1][1] * unit[1] + basis[1][2] * unit[2],
            basis[2][0] * unit[0] + basis[2][1] * unit[1] + basis[2][2] * unit[2],
        ];
        let phi = rotated[2].clamp(-1.0, 1.0).acos();
        let theta = rotated[1].atan2(rotated[0]);

        // Theta resolution follows the circumference at this phi
        let int_phi = quantize(phi * (scale / (0.5 * PI)));
        let theta_scale = if int_phi == 0 {
            0.0
        } else if int_phi <= 4 {
            2.0 / PI
        } else {
            int_phi as f32 / (2.0 * PI)
        };
        output[element * 3 + 1] = int_phi;
        output[element * 3 + 2] = quantize((theta + PI) * theta_scale);
    }
    output
}

/// Converts (magnitude, phi, theta) integers back to cartesian normals against the same smooth
/// normal prediction the encoder used.
fn restore_normals(
    int_normals: &[i32], vertex_count: usize, restored_vertices: &[f32],
    triangles: &[[u32; 3]], precision: f32,
) -> Vec<f32> {
    let smooth = calc_smooth_normals(vertex_count, restored_vertices, triangles);

    let mut output = vec![0f32; vertex_count * 3];
    for element in 0..vertex_count {
        let magnitude = int_normals[element * 3] as f32 * precision;

        let int_phi = int_normals[element * 3 + 1];
        let phi = int_phi as f32 * (0.5 * PI) * precision;
        let theta_scale = if int_phi == 0 {
            0.0
        } else if int_phi <= 4 {
            PI / 2.0
        } else {
            (2.0 * PI) / int_phi as f32
        };
        let theta = int_normals[element * 3 + 2] as f32 * theta_scale - PI;

        let spherical = [phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()];
        let prediction =
            [smooth[element * 3], smooth[element * 3 + 1], smooth[element * 3 + 2]];
        let basis = make_normal_coord_sys(prediction);
        for component in 0..3 {
            // Transposed basis: rotate from the prediction's frame back to world space
            let value = basis[0][component] * spherical[0]
                + basis[1][component] * spherical[1]
                + basis[2][component] * spherical[2];
            output[element * 3 + component] = value * magnitude;
        }
    }
    output
}

/// Quantizes one map in sorted-vertex order and delta-codes consecutive values.
fn make_map_deltas<const N: usize>(
    array: &ArrayRef<'_>, sorted: &[SortVertex], precision: f32,
) -> Vec<i32> {
    let scale = 1.0 / precision;
    let mut output = vec![0i32; sorted.len() * N];
    let mut previous = [0i32; N];

    for (element, vertex) in sorted.iter().enumerate() {
        let original = vertex.original_index as usize;
        for component in 0..N {
            let value = quantize(scale * array.get_f(original, component));
            output[element * N + component] = value.wrapping_sub(previous[component]);
            previous[component] = value;
        }
    }
    output
}

/// Undoes [`make_map_deltas`] into the bound output array, already in sorted-vertex order.
fn restore_map_deltas<const N: usize>(
    deltas: &[i32], array: &mut ArrayMut<'_>, vertex_count: usize, precision: f32,
) {
    let mut previous = [0i32; N];
    for element in 0..vertex_count {
        for component in 0..N {
            let value = deltas[element * N + component].wrapping_add(previous[component]);
            array.set_f(element, component, value as f32 * precision);
            previous[component] = value;
        }
    }
}

pub(crate) fn encode<W: Write>(ctx: &Exporter<'_>, writer: &mut StreamWriter<W>) -> Result<()> {
    let Some(vertices) = &ctx.vertices else { return InternalSnafu.fail() };
    let Some(indices) = &ctx.indices else { return InternalSnafu.fail() };
    let vertex_count = vertices.len();
    let triangle_count = indices.len();

    let grid = Grid::setup(vertices);
    log::debug!("MG2 grid divisions: {:?}", grid.division);

    writer.write_tag(tags::MG2_HEADER)?;
    writer.write_f32(ctx.vertex_precision)?;
    writer.write_f32(ctx.normal_precision)?;
    grid.write(writer)?;

    let sorted = sort_vertices(vertices, &grid);

    let int_vertices = make_vertex_deltas(vertices, &sorted, &grid, ctx.vertex_precision);
    log::debug!("MG2 vertices: {vertex_count}");
    writer.write_tag(tags::VERTICES)?;
    packed::write_packed_ints(writer, &int_vertices, vertex_count, 3, false)?;

    let cells: Vec<u32> = sorted.iter().map(|vertex| vertex.cell).collect();
    let mut cell_deltas = vec![0i32; vertex_count];
    cell_deltas[0] = cells[0] as i32;
    for element in 1..vertex_count {
        cell_deltas[element] = cells[element].wrapping_sub(cells[element - 1]) as i32;
    }
    log::debug!("MG2 grid indices: {vertex_count}");
    writer.write_tag(tags::GRID_INDICES)?;
    packed::write_packed_ints(writer, &cell_deltas, vertex_count, 1, false)?;

    // The decoder only ever sees reconstructed positions, so the normal prediction has to be
    // computed from those, not from the source data
    let restored = ctx
        .normals
        .is_some()
        .then(|| restore_vertices(&int_vertices, &cells, &grid, ctx.vertex_precision));

    let mut index_lut = vec![0u32; vertex_count];
    for (new_index, vertex) in sorted.iter().enumerate() {
        index_lut[vertex.original_index as usize] = new_index as u32;
    }
    let mut triangles = collect_triangles(indices);
    for triangle in &mut triangles {
        for corner in triangle.iter_mut() {
            *corner = index_lut[*corner as usize];
        }
    }
    rearrange_triangles(&mut triangles);

    let mut delta_triangles = triangles.clone();
    make_index_deltas(&mut delta_triangles);
    log::debug!("MG2 indices: {triangle_count} triangles");
    writer.write_tag(tags::INDICES)?;
    packed::write_packed_ints(
        writer,
        &flatten_triangles(&delta_triangles),
        triangle_count,
        3,
        false,
    )?;

    if let Some(normals) = &ctx.normals {
        let Some(restored) = &restored else { return InternalSnafu.fail() };
        let int_normals =
            make_normal_deltas(normals, &sorted, restored, &triangles, ctx.normal_precision);
        log::debug!("MG2 normals: {vertex_count}");
        writer.write_tag(tags::NORMALS)?;
        packed::write_packed_ints(writer, &int_normals, vertex_count, 3, false)?;
    }

    for map in &ctx.uv_maps {
        log::debug!("MG2 UV map {:?}", map.info.name);
        let deltas = make_map_deltas::<2>(&map.array, &sorted, map.precision);
        writer.write_tag(tags::UV_COORDS)?;
        writer.write_f32(map.precision)?;
        packed::write_packed_ints(writer, &deltas, vertex_count, 2, true)?;
    }

    for map in &ctx.attrib_maps {
        log::debug!("MG2 attribute map {:?}", map.info.name);
        let deltas = make_map_deltas::<4>(&map.array, &sorted, map.precision);
        writer.write_tag(tags::ATTRIBS)?;
        writer.write_f32(map.precision)?;
        packed::write_packed_ints(writer, &deltas, vertex_count, 4, true)?;
    }

    Ok(())
}

pub(crate) fn decode<R: Read>(ctx: &mut Importer<'_>, reader: &mut StreamReader<R>) -> Result<()> {
    let vertex_count = ctx.header.vertex_count as usize;
    let triangle_count = ctx.header.triangle_count as usize;

    ensure!(reader.read_tag()? == tags::MG2_HEADER, BadFormatSnafu);
    let vertex_precision = reader.read_f32()?;
    ensure!(vertex_precision > 0.0 && vertex_precision.is_finite(), BadFormatSnafu);
    let normal_precision = reader.read_f32()?;
    ensure!(normal_precision > 0.0 && normal_precision.is_finite(), BadFormatSnafu);
    let grid = Grid::read(reader)?;
    ctx.vertex_precision = vertex_precision;
    ctx.normal_precision = normal_precision;
    log::debug!("MG2 grid divisions: {:?}", grid.division);

    ensure!(reader.read_tag()? == tags::VERTICES, BadFormatSnafu);
    let int_vertices = packed::read_packed_ints(reader, vertex_count, 3, false)?;

    ensure!(reader.read_tag()? == tags::GRID_INDICES, BadFormatSnafu);
    let cell_deltas = packed::read_packed_ints(reader, vertex_count, 1, false)?;
    let mut cells = vec![0u32; vertex_count];
    cells[0] = cell_deltas[0] as u32;
    for element in 1..vertex_count {
        cells[element] = cells[element - 1].wrapping_add(cell_deltas[element] as u32);
    }

    let restored = restore_vertices(&int_vertices, &cells, &grid, vertex_precision);
    {
        let Some(vertices) = &mut ctx.vertices else { return InternalSnafu.fail() };
        for element in 0..vertex_count {
            for component in 0..3 {
                vertices.set_f(element, component, restored[element * 3 + component]);
            }
        }
    }

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

    if ctx.header.has_normals() {
        ensure!(reader.read_tag()? == tags::NORMALS, BadFormatSnafu);
        let int_normals = packed::read_packed_ints(reader, vertex_count, 3, false)?;
        if ctx.normals.is_some() {
            let values = restore_normals(
                &int_normals,
                vertex_count,
                &restored,
                &triangles,
                normal_precision,
            );
            let Some(normals) = &mut ctx.normals else { return InternalSnafu.fail() };
            for element in 0..vertex_count {
                for component in 0..3 {
                    normals.set_f(element, component, values[element * 3 + component]);
                }
            }
        }
    }

    for map in &mut ctx.uv_maps {
        ensure!(reader.read_tag()? == tags::UV_COORDS, BadFormatSnafu);
        let precision = reader.read_f32()?;
        ensure!(precision > 0.0 && precision.is_finite(), BadFormatSnafu);
        map.precision = Some(precision);
        let deltas = packed::read_packed_ints(reader, vertex_count, 2, true)?;
        if let Some(array) = &mut map.array {
            restore_map_deltas::<2>(&deltas, array, vertex_count, precision);
        }
    }

    for map in &mut ctx.attrib_maps {
        ensure!(reader.read_tag()? == tags::ATTRIBS, BadFormatSnafu);
        let precision = reader.read_f32()?;
        ensure!(precision > 0.0 && precision.is_finite(), BadFormatSnafu);
        map.precision = Some(precision);
        let deltas = packed::read_packed_ints(reader, vertex_count, 4, true)?;
        if let Some(array) = &mut map.array {
            restore_map_deltas::<4>(&deltas, array, vertex_count, precision);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_cell_and_origin_invert() {
        let mut grid = Grid {
            min: [0.0, 0.0, 0.0],
            max: [4.0, 2.0, 2.0],
            division: [4, 2, 2],
            size: [0.0; 3],
        };
        grid.update_sizes();

        let cell = grid.cell_of([2.5, 1.5, 0.5]);
        assert_eq!(cell, 2 + 4 * 1);
        assert_eq!(grid.origin_of(cell), [2.0, 1.0, 0.0]);

        //Points on the upper boundary clamp into the last cell
        let cell = grid.cell_of([4.0, 2.0, 2.0]);
        assert_eq!(cell, 3 + 4 * (1 + 2 * 1));
    }

    #[test]
    fn degenerate_box_uses_fixed_divisions() {
        let positions = [1.0f32, 2.0, 3.0, 1.0, 2.0, 3.0];
        let view = ArrayRef::new(&positions[..], 3).unwrap();
        let grid = Grid::setup(&view);
        assert_eq!(grid.division, [4, 4, 4]);
    }

    #[test]
    fn vertex_deltas_invert() {
        let positions = [
            0.1f32, 0.2, 0.3, 1.4, 0.6, 0.1, 0.9, 1.8, 0.2, 1.1, 1.0, 1.9, 0.15, 0.21, 0.33,
        ];
        let view = ArrayRef::new(&positions[..], 3).unwrap();
        let grid = Grid::setup(&view);
        let precision = 1.0 / 1024.0;

        let sorted = sort_vertices(&view, &grid);
        let deltas = make_vertex_deltas(&view, &sorted, &grid, precision);
        let cells: Vec<u32> = sorted.iter().map(|vertex| vertex.cell).collect();
        let restored = restore_vertices(&deltas, &cells, &grid, precision);

        for (element, vertex) in sorted.iter().enumerate() {
            let original = vertex.original_index as usize;
            for component in 0..3 {
                let error =
                    (restored[element * 3 + component] - positions[original * 3 + component]).abs();
                assert!(error <= precision, "error {error} above {precision}");
            }
        }
    }

    #[test]
    fn normal_frame_is_orthonormal() {
        for normal in [
            [0.0f32, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.577_350_26, 0.577_350_26, 0.577_350_26],
            [0.0, -1.0, 0.0],
        ] {
            let [x, y, z] = make_normal_coord_sys(normal);
            let dot = |a: [f32; 3], b: [f32; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
            assert!(dot(x, z).abs() < 1e-6);
            assert!(dot(x, y).abs() < 1e-6);
            assert!(dot(y, z).abs() < 1e-6);
            assert!((dot(x, x) - 1.0).abs() < 1e-5);
            assert!((dot(y, y) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn map_deltas_invert_within_precision() {
        let coords = [0.0f32, 0.0, 0.25, 0.5, 0.75, 1.0];
        let view = ArrayRef::new(&coords[..], 2).unwrap();
        let sorted: Vec<SortVertex> = (0..3)
            .map(|element| SortVertex { x: 0.0, cell: 0, original_index: element as u32 })
            .collect();
        let precision = 1.0 / 4096.0;

        let deltas = make_map_deltas::<2>(&view, &sorted, precision);
        let mut output = [0f32; 6];
        let mut array = ArrayMut::new(&mut output[..], 2).unwrap();
        restore_map_deltas::<2>(&deltas, &mut array, 3, precision);

        for (restored, original) in output.iter().zip(coords.iter()) {
            assert!((restored - original).abs() <= precision);
        }
    }
}
