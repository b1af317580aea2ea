//! The import context: two-phase decoding of an OpenCTM stream.
//!
//! Phase one, [`Importer::read_header`], consumes only the container header and leaves the
//! stream positioned at the body. At that point the caller knows every count, the map registry,
//! and the comment, and can size and bind its output arrays. Phase two,
//! [`Importer::read_body`], runs the method-specific decoder into the bound arrays and then
//! re-validates the restored mesh.
//!
//! Positions and indices must be bound before phase two. Normals and maps are optional: a
//! declared section with no bound array is decoded and discarded, so a caller can cheaply skip
//! payloads it does not care about. The method used for decoding comes from the header alone.

use std::io::Read;

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{InvalidArgumentSnafu, InvalidOperationSnafu, Result};
use crate::export::{AttribMapId, UvMapId};
use crate::format::{Header, Method};
use crate::validate::check_mesh;
use crate::{mg1, mg2, raw};

pub(crate) struct ImportMap<'a> {
    pub(crate) precision: Option<f32>,
    pub(crate) array: Option<ArrayMut<'a>>,
}

/// Reads meshes from OpenCTM streams in two phases: header, then body.
///
/// # Examples
/// ```
/// # use openctm::array::{ArrayMut, ArrayRef};
/// # use openctm::{Exporter, Importer, Method};
/// # let vertices = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
/// # let indices = [0u32, 1, 2];
/// # let mut exporter = Exporter::new();
/// # exporter.set_method(Method::Raw);
/// # exporter.bind_vertices(ArrayRef::new(&vertices[..], 3)?)?;
/// # exporter.bind_indices(ArrayRef::new(&indices[..], 3)?)?;
/// # let mut stream = Vec::new();
/// # exporter.save(&mut stream)?;
/// let mut reader = &stream[..];
/// let mut importer = Importer::read_header(&mut reader)?;
///
/// let mut positions = vec![0.0f32; importer.vertex_count() as usize * 3];
/// let mut triangles = vec![0u32; importer.triangle_count() as usize * 3];
/// importer.bind_vertices(ArrayMut::new(&mut positions[..], 3)?)?;
/// importer.bind_indices(ArrayMut::new(&mut triangles[..], 3)?)?;
/// importer.read_body(&mut reader)?;
///
/// assert_eq!(triangles, [0, 1, 2]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Importer<'a> {
    pub(crate) header: Header,
    pub(crate) vertex_precision: f32,
    pub(crate) normal_precision: f32,
    pub(crate) vertices: Option<ArrayMut<'a>>,
    pub(crate) indices: Option<ArrayMut<'a>>,
    pub(crate) normals: Option<ArrayMut<'a>>,
    pub(crate) uv_maps: Vec<ImportMap<'a>>,
    pub(crate) attrib_maps: Vec<ImportMap<'a>>,
}

impl<'a> Importer<'a> {
    /// Reads and validates the container header, phase one of a decode.
    ///
    /// # Errors
    /// Returns [`BadFormat`](crate::Error::BadFormat),
    /// [`UnsupportedFormatVersion`](crate::Error::UnsupportedFormatVersion) or
    /// [`FileError`](crate::Error::FileError) as reported by the header parser.
    pub fn read_header<R: Read>(reader: &mut R) -> Result<Self> {
        let header = Header::read(&mut StreamReader::new(reader))?;
        let uv_maps =
            header.uv_maps.iter().map(|_| ImportMap { precision: None, array: None }).collect();
        let attrib_maps =
            header.attrib_maps.iter().map(|_| ImportMap { precision: None, array: None }).collect();
        Ok(Self {
            header,
            vertex_precision: 0.0,
            normal_precision: 0.0,
            vertices: None,
            indices: None,
            normals: None,
            uv_maps,
            attrib_maps,
        })
    }

    /// The compression method declared by the stream.
    #[inline]
    #[must_use]
    pub fn method(&self) -> Method {
        self.header.method
    }

    /// Number of vertices in the stream.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.header.vertex_count
    }

    /// Number of triangles in the stream.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.header.triangle_count
    }

    /// Whether the stream carries a normal section.
    #[inline]
    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.header.has_normals()
    }

    /// The file comment, if the stream has one.
    #[inline]
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.header.comment.as_deref()
    }

    /// Number of UV maps declared in the header.
    #[inline]
    #[must_use]
    pub fn uv_map_count(&self) -> usize {
        self.uv_maps.len()
    }

    /// Number of attribute maps declared in the header.
    #[inline]
    #[must_use]
    pub fn attrib_map_count(&self) -> usize {
        self.attrib_maps.len()
    }

    /// Handles of all UV maps, in registry order.
    pub fn uv_map_ids(&self) -> impl Iterator<Item = UvMapId> {
        (0..self.uv_maps.len()).map(UvMapId)
    }

    /// Handles of all attribute maps, in registry order.
    pub fn attrib_map_ids(&self) -> impl Iterator<Item = AttribMapId> {
        (0..self.attrib_maps.len()).map(AttribMapId)
    }

    /// Name of one UV map.
    #[must_use]
    pub fn uv_map_name(&self, id: UvMapId) -> Option<&str> {
        self.header.uv_maps.get(id.0).map(|info| info.name.as_str())
    }

    /// Texture file reference of one UV map, if the stream stored one.
    #[must_use]
    pub fn uv_map_file_name(&self, id: UvMapId) -> Option<&str> {
        self.header.uv_maps.get(id.0).and_then(|info| info.file_name.as_deref())
    }

    /// Name of one attribute map.
    #[must_use]
    pub fn attrib_map_name(&self, id: AttribMapId) -> Option<&str> {
        self.header.attrib_maps.get(id.0).map(|info| info.name.as_str())
    }

    /// Looks a UV map up by name.
    #[must_use]
    pub fn find_uv_map(&self, name: &str) -> Option<UvMapId> {
        self.header.uv_maps.iter().position(|info| info.name == name).map(UvMapId)
    }

    /// Looks an attribute map up by name.
    #[must_use]
    pub fn find_attrib_map(&self, name: &str) -> Option<AttribMapId> {
        self.header.attrib_maps.iter().position(|info| info.name == name).map(AttribMapId)
    }

    /// The vertex precision of an MG2 stream. `None` before [`read_body`](Self::read_body) has
    /// run, or for methods that do not quantize.
    #[must_use]
    pub fn vertex_precision(&self) -> Option<f32> {
        (self.vertex_precision > 0.0).then_some(self.vertex_precision)
    }

    /// The normal precision of an MG2 stream, with the same availability rules as
    /// [`vertex_precision`](Self::vertex_precision).
    #[must_use]
    pub fn normal_precision(&self) -> Option<f32> {
        (self.normal_precision > 0.0).then_some(self.normal_precision)
    }

    /// The precision one UV map was quantized with, once an MG2 body has been decoded.
    #[must_use]
    pub fn uv_map_precision(&self, id: UvMapId) -> Option<f32> {
        self.uv_maps.get(id.0).and_then(|map| map.precision)
    }

    /// The precision one attribute map was quantized with, once an MG2 body has been decoded.
    #[must_use]
    pub fn attrib_map_precision(&self, id: AttribMapId) -> Option<f32> {
        self.attrib_maps.get(id.0).and_then(|map| map.precision)
    }

    /// Binds the position output array: three components, at least `vertex_count` elements.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three or an array shorter than the vertex count.
    pub fn bind_vertices(&mut self, array: ArrayMut<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        ensure!(array.len() >= self.header.vertex_count as usize, InvalidArgumentSnafu);
        self.vertices = Some(array);
        Ok(())
    }

    /// Binds the triangle index output array: three components, at least `triangle_count`
    /// elements.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three or an array shorter than the triangle count.
    pub fn bind_indices(&mut self, array: ArrayMut<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        ensure!(array.len() >= self.header.triangle_count as usize, InvalidArgumentSnafu);
        self.indices = Some(array);
        Ok(())
    }

    /// Binds the normal output array: three components, at least `vertex_count` elements.
    /// Without a binding, a normal section in the stream is decoded and discarded.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for a component count other
    /// than three or an array shorter than the vertex count.
    pub fn bind_normals(&mut self, array: ArrayMut<'a>) -> Result<()> {
        ensure!(array.components() == 3, InvalidArgumentSnafu);
        ensure!(array.len() >= self.header.vertex_count as usize, InvalidArgumentSnafu);
        self.normals = Some(array);
        Ok(())
    }

    /// Binds the output array for one UV map: two components, at least `vertex_count` elements.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for an unknown handle, a
    /// component count other than two, or an array shorter than the vertex count.
    pub fn bind_uv_map(&mut self, id: UvMapId, array: ArrayMut<'a>) -> Result<()> {
        ensure!(array.components() == 2, InvalidArgumentSnafu);
        ensure!(array.len() >= self.header.vertex_count as usize, InvalidArgumentSnafu);
        let map = self.uv_maps.get_mut(id.0).context(InvalidArgumentSnafu)?;
        map.array = Some(array);
        Ok(())
    }

    /// Binds the output array for one attribute map: 1..=4 components, at least `vertex_count`
    /// elements. Components the array does not have are dropped on write.
    ///
    /// # Errors
    /// Returns [`InvalidArgument`](crate::Error::InvalidArgument) for an unknown handle or an
    /// array shorter than the vertex count.
    pub fn bind_attrib_map(&mut self, id: AttribMapId, array: ArrayMut<'a>) -> Result<()> {
        ensure!(array.len() >= self.header.vertex_count as usize, InvalidArgumentSnafu);
        let map = self.attrib_maps.get_mut(id.0).context(InvalidArgumentSnafu)?;
        map.array = Some(array);
        Ok(())
    }

    /// Decodes the stream body into the bound arrays, phase two of a decode, and validates the
    /// restored mesh.
    ///
    /// On failure the bound arrays may have been partially written; their contents are undefined
    /// until a later decode succeeds.
    ///
    /// # Errors
    /// Returns [`InvalidOperation`](crate::Error::InvalidOperation) if positions or indices are
    /// not bound, [`BadFormat`](crate::Error::BadFormat)/[`Lzma`](crate::Error::Lzma)
    /// for undecodable data, [`InvalidMesh`](crate::Error::InvalidMesh) if the restored mesh
    /// violates an invariant, and [`FileError`](crate::Error::FileError) if the stream ends
    /// early.
    pub fn read_body<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        ensure!(self.vertices.is_some() && self.indices.is_some(), InvalidOperationSnafu);

        let mut stream = StreamReader::new(reader);
        match self.header.method {
            Method::Raw => raw::decode(self, &mut stream)?,
            Method::Mg1 => mg1::decode(self, &mut stream)?,
            Method::Mg2 => mg2::decode(self, &mut stream)?,
        }

        let (Some(vertices), Some(indices)) = (&self.vertices, &self.indices) else {
            // Checked above; bindings never disappear during a decode
            return InvalidOperationSnafu.fail();
        };
        let uv_views: Vec<ArrayRef<'_>> = self
            .uv_maps
            .iter()
            .filter_map(|map| map.array.as_ref().map(ArrayMut::as_array_ref))
            .collect();
        let attrib_views: Vec<ArrayRef<'_>> = self
            .attrib_maps
            .iter()
            .filter_map(|map| map.array.as_ref().map(ArrayMut::as_array_ref))
            .collect();
        let normal_view = self.normals.as_ref().map(ArrayMut::as_array_ref);
        check_mesh(
            &vertices.as_array_ref(),
            &indices.as_array_ref(),
            normal_view.as_ref(),
            &uv_views,
            &attrib_views,
            self.header.vertex_count as usize,
            self.header.triangle_count as usize,
        )
    }
}
