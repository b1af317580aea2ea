//! The export context: configuration, array bindings, and the terminal `save` call.
//!
//! An [`Exporter`] borrows the caller's mesh arrays through [`ArrayRef`] views, carries the
//! compression configuration, and writes one complete OpenCTM stream when [`save`](Exporter::save)
//! is called. It never owns mesh data and holds no state between saves beyond its configuration,
//! so one exporter can write the same mesh to several streams.
//!
//! Vertex and triangle counts are taken from the bound position and index views; the optional
//! arrays only have to be at least that long.

use std::io::Write;

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{InvalidArgumentSnafu, InvalidMeshSnafu, Result};
use crate::format::{Header, HeaderFlags, MapInfo, Method, MAX_MAPS};
use crate::validate::check_mesh;
use crate::{mg1, mg2, raw};

/// Handle to one UV map of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UvMapId(pub(crate) usize);

/// Handle to one attribute map of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttribMapId(pub(crate) usize);

pub(crate) struct ExportMap<'a> {
    pub(crate) info: MapInfo,
    pub(crate) precision: f32,
    pub(crate) array: ArrayRef<'a>,
}

/// Writes meshes as OpenCTM streams.
///
/// # Examples
/// ```
/// # use openctm::array::ArrayRef;
/// # use openctm::{Exporter, Method};
/// let vertices = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
/// let indices = [0u32, 1, 2];
///
/// let mut exporter = Exporter::new();
/// exporter.set_method(Method::Mg1);
/// exporter.bind_vertices(ArrayRef::new(&vertices[..], 3)?)?;
/// exporter.bind_indices(ArrayRef::new(&indices[..], 3)?)?;
///
/// let mut stream = Vec::new();
/// exporter.save(&mut stream)?;
/// assert_eq!(&stream[..4], b"OCTM");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Exporter<'a> {
    pub(crate) method: Method,
    pub(crate) compression_level: u32,
    pub(crate) vertex_precision: f32,
    pub(crate) normal_precision: f32,
    pub(crate) comment: Option<String>,
    pub(crate) vertices: Option<ArrayRef<'a>>,
    pub(crate) indices: Option<ArrayRef<'a>>,
    pub(crate) normals: Option<ArrayRef<'a>>,
    pub(crate) uv_maps: Vec<ExportMap<'a>>,
    pub(crate) attrib_maps: Vec<ExportMap<'a>>,
}

impl Default for Exporter<'_> {
    fn default() -> Self {
        Self {
            method: Method::Mg1,
            compression_level: 1,
            vertex_precision: 1.0 / 1024.0,
            normal_precision: 1.0 / 256.0,
            comment: None,
            vertices: None,
            indices: None,
            normals: None,
            uv_maps: Vec::new(),
            attrib_maps: Vec::new(),
        }
    }
}

impl<'a> Exporter<'a> {
    /// Creates an export context with the default configuration: MG1, compression level 1,
    /// vertex precision 2^-10, normal precision 2^-8.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the compression method for the next save.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Sets the LZMA effort level, 0..=9.
    ///
    /// The level never affects what a decoder needs to know; the properties header stored with
    /// each packed section stays authoritative. The current LZMA backend encodes with one fixed
    /// parameter set, so the level is recorded as configuration only.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a level above 9.
    pub fn set_compression_level(&mut self, level: u32) -> Result<()> {
        ensure!(level <= 9, InvalidArgumentSnafu);
        self.compression_level = level;
        Ok(())
    }

    /// The configured LZMA effort level.
    #[inline]
    #[must_use]
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Sets the fixed-point precision for MG2 vertex coordinates.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) unless the precision is a
    /// positive finite value.
    pub fn set_vertex_precision(&mut self, precision: f32) -> Result<()> {
        ensure!(precision > 0.0 && precision.is_finite(), InvalidArgumentSnafu);
        self.vertex_precision = precision;
        Ok(())
    }

    /// Derives the MG2 vertex precision from the mesh itself: `relative` times the mean edge
    /// length. Every half edge of every triangle counts, so shared edges weigh double, which is
    /// what you want for a closed mesh.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a non-positive factor and
    /// [`InvalidMesh`](crate::Error::InvalidMesh) if positions and indices are not bound yet.
    pub fn set_vertex_precision_rel(&mut self, relative: f32) -> Result<()> {
        ensure!(relative > 0.0 && relative.is_finite(), InvalidArgumentSnafu);
        let (Some(vertices), Some(indices)) = (&self.vertices, &self.indices) else {
            return InvalidMeshSnafu.fail();
        };
        ensure!(!indices.is_empty(), InvalidMeshSnafu);

        let mut total_length = 0.0f32;
        for element in 0..indices.len() {
            let corners = [
                indices.get_i(element, 0) as usize,
                indices.get_i(element, 1) as usize,
                indices.get_i(element, 2) as usize,
            ];
            let mut previous = corners[2];
            for &corner in &corners {
                let mut squared = 0.0f32;
                for component in 0..3 {
                    let edge = vertices.get_f(corner, component)
                        - vertices.get_f(previous, component);
                    squared += edge * edge;
                }
                total_length += squared.sqrt();
                previous = corner;
            }
        }

        let edge_count = indices.len() * 3;
        self.vertex_precision = relative * (total_length / edge_count as f32);
        Ok(())
    }

    /// Sets the fixed-point precision for MG2 normal coding.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) unless the precision is a
    /// positive finite value.
    pub fn set_normal_precision(&mut self, precision: f32) -> Result<()> {
        ensure!(precision > 0.0 && precision.is_finite(), InvalidArgumentSnafu);
        self.normal_precision = precision;
        Ok(())
    }

    /// Sets the file comment stored in the container header. `None` clears it.
    pub fn set_comment(&mut self, comment: Option<&str>) {
        self.comment = comment.filter(|text| !text.is_empty()).map(str::to_owned);
    }

    /// Binds the position array. Must be three components per element.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three.
    pub fn bind_vertices(&mut self, array: ArrayRef<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        self.vertices = Some(array);
        Ok(())
    }

    /// Binds the triangle index array. Must be three components per element.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three.
    pub fn bind_indices(&mut self, array: ArrayRef<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        self.indices = Some(array);
        Ok(())
    }

    /// Binds the optional normal array. Must be three components per element; binding it turns
    /// on the has-normals header flag.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three.
    pub fn bind_normals(&mut self, array: ArrayRef<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        self.normals = Some(array);
        Ok(())
    }

    /// Registers a UV map with a unique name, an optional texture file reference, and its
    /// two-component coordinate array. The default precision is 2^-12.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a duplicate name, a
    /// component count other than two, or more than [`MAX_MAPS`] maps.
    pub fn add_uv_map(
        &mut self, name: &str, file_name: Option<&str>, array: ArrayRef<'a>,
    ) -> Result<UvMapId> {
        ensure!(array.components() == 2, InvalidArgumentSnafu);
        ensure!(self.uv_maps.len() < MAX_MAPS, InvalidArgumentSnafu);
        ensure!(
            self.uv_maps.iter().all(|map| map.info.name != name),
            InvalidArgumentSnafu
        );

        self.uv_maps.push(ExportMap {
            info: MapInfo {
                name: name.to_owned(),
                file_name: file_name.filter(|text| !text.is_empty()).map(str::to_owned),
            },
            precision: 1.0 / 4096.0,
            array,
        });
        Ok(UvMapId(self.uv_maps.len() - 1))
    }

    /// Registers an attribute map with a unique name and its 1..=4 component value array. The
    /// default precision is 2^-8.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a duplicate name or more
    /// than [`MAX_MAPS`] maps.
    pub fn add_attrib_map(&mut self, name: &str, array: ArrayRef<'a>) -> Result<AttribMapId> {
        ensure!(self.attrib_maps.len() < MAX_MAPS, InvalidArgumentSnafu);
        ensure!(
            self.attrib_maps.iter().all(|map| map.info.name != name),
            InvalidArgumentSnafu
        );

        self.attrib_maps.push(ExportMap {
            info: MapInfo { name: name.to_owned(), file_name: None },
            precision: 1.0 / 256.0,
            array,
        });
        Ok(AttribMapId(self.attrib_maps.len() - 1))
    }

    /// Sets the MG2 precision of one UV map.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for an unknown handle or a
    /// non-positive precision.
    pub fn set_uv_precision(&mut self, id: UvMapId, precision: f32) -> Result<()> {
        ensure!(precision > 0.0 && precision.is_finite(), InvalidArgumentSnafu);
        let map = self.uv_maps.get_mut(id.0).context(InvalidArgumentSnafu)?;
        map.precision = precision;
        Ok(())
    }

    /// Sets the MG2 precision of one attribute map.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for an unknown handle or a
    /// non-positive precision.
    pub fn set_attrib_precision(&mut self, id: AttribMapId, precision: f32) -> Result<()> {
        ensure!(precision > 0.0 && precision.is_finite(), InvalidArgumentSnafu);
        let map = self.attrib_maps.get_mut(id.0).context(InvalidArgumentSnafu)?;
        map.precision = precision;
        Ok(())
    }

    /// Encodes the bound mesh into `writer` as one complete OpenCTM stream.
    ///
    /// # Errors
    /// Returns [`InvalidMesh`](crate::Error::InvalidMesh) if mandatory arrays are missing, an
    /// optional array is shorter than the vertex count, an index is out of range, or any value
    /// is not finite; [`FileError`](crate::Error::FileError) if the stream refuses bytes; and
    /// [`Lzma`](crate::Error::Lzma) if compression fails.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let (Some(vertices), Some(indices)) = (&self.vertices, &self.indices) else {
            return InvalidMeshSnafu.fail();
        };
        let vertex_count = vertices.len();
        let triangle_count = indices.len();
        ensure!(vertex_count >= 1 && triangle_count >= 1, InvalidMeshSnafu);
        ensure!(
            vertex_count <= u32::MAX as usize && triangle_count <= u32::MAX as usize,
            InvalidMeshSnafu
        );

        if let Some(normals) = &self.normals {
            ensure!(normals.len() >= vertex_count, InvalidMeshSnafu);
        }
        let uv_views: Vec<ArrayRef<'_>> = self.uv_maps.iter().map(|map| map.array).collect();
        let attrib_views: Vec<ArrayRef<'_>> =
            self.attrib_maps.iter().map(|map| map.array).collect();
        for view in uv_views.iter().chain(attrib_views.iter()) {
            ensure!(view.len() >= vertex_count, InvalidMeshSnafu);
        }

        check_mesh(
            vertices,
            indices,
            self.normals.as_ref(),
            &uv_views,
            &attrib_views,
            vertex_count,
            triangle_count,
        )?;

        let mut flags = HeaderFlags::empty();
        if self.normals.is_some() {
            flags |= HeaderFlags::HAS_NORMALS;
        }
        let header = Header {
            method: self.method,
            vertex_count: vertex_count as u32,
            triangle_count: triangle_count as u32,
            flags,
            comment: self.comment.clone(),
            uv_maps: self.uv_maps.iter().map(|map| map.info.clone()).collect(),
            attrib_maps: self.attrib_maps.iter().map(|map| map.info.clone()).collect(),
        };

        let mut stream = StreamWriter::new(&mut *writer);
        header.write(&mut stream)?;
        match self.method {
            Method::Raw => raw::encode(self, &mut stream)?,
            Method::Mg1 => mg1::encode(self, &mut stream)?,
            Method::Mg2 => mg2::encode(self, &mut stream)?,
        }
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn save_without_arrays_is_invalid_mesh() {
        let exporter = Exporter::new();
        let mut stream = Vec::new();
        assert!(matches!(exporter.save(&mut stream), Err(Error::InvalidMesh)));
        assert!(stream.is_empty());
    }

    #[test]
    fn out_of_range_index_is_invalid_mesh() {
        let vertices = [0.0f32; 9];
        let indices = [0u32, 1, 3];
        let mut exporter = Exporter::new();
        exporter.bind_vertices(ArrayRef::new(&vertices[..], 3).unwrap()).unwrap();
        exporter.bind_indices(ArrayRef::new(&indices[..], 3).unwrap()).unwrap();

        let mut stream = Vec::new();
        assert!(matches!(exporter.save(&mut stream), Err(Error::InvalidMesh)));
    }

    #[test]
    fn non_finite_positions_are_invalid_mesh() {
        let vertices = [0.0f32, 0.0, f32::NAN, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices = [0u32, 1, 2];
        let mut exporter = Exporter::new();
        exporter.bind_vertices(ArrayRef::new(&vertices[..], 3).unwrap()).unwrap();
        exporter.bind_indices(ArrayRef::new(&indices[..], 3).unwrap()).unwrap();

        let mut stream = Vec::new();
        assert!(matches!(exporter.save(&mut stream), Err(Error::InvalidMesh)));
    }

    #[test]
    fn configuration_arguments_are_checked() {
        let mut exporter = Exporter::new();
        assert!(exporter.set_compression_level(9).is_ok());
        assert!(matches!(exporter.set_compression_level(10), Err(Error::InvalidArgument)));
        assert!(matches!(exporter.set_vertex_precision(0.0), Err(Error::InvalidArgument)));
        assert!(matches!(exporter.set_normal_precision(-1.0), Err(Error::InvalidArgument)));
    }

    #[test]
    fn duplicate_map_names_are_rejected() {
        let coords = [0.0f32; 6];
        let mut exporter = Exporter::new();
        let array = ArrayRef::new(&coords[..], 2).unwrap();
        exporter.add_uv_map("uv", None, array).unwrap();
        assert!(matches!(
            exporter.add_uv_map("uv", None, array),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn relative_precision_uses_mean_edge_length() {
        //Unit right triangle: edges 1, 1 and sqrt(2)
        let vertices = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices = [0u32, 1, 2];
        let mut exporter = Exporter::new();
        exporter.bind_vertices(ArrayRef::new(&vertices[..], 3).unwrap()).unwrap();
        exporter.bind_indices(ArrayRef::new(&indices[..], 3).unwrap()).unwrap();

        exporter.set_vertex_precision_rel(0.01).unwrap();
        let mean = (1.0 + 1.0 + 2.0f32.sqrt()) / 3.0;
        assert!((exporter.vertex_precision - 0.01 * mean).abs() < 1e-6);
    }
}
