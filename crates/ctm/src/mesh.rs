//! An owned mesh value type and single-call read/write entry points.
//!
//! The context API in [`export`](crate::export) and [`import`](crate::import) works on borrowed
//! caller memory and never allocates mesh storage. For tools and tests that just want the whole
//! mesh, [`Mesh`] owns everything as flat `Vec`s and wraps the two-phase machinery into one
//! call per direction, plus `std::fs` conveniences in the `*_path` style.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use openctm_core::prelude::*;

use crate::error::Result;
use crate::export::{AttribMapId, Exporter, UvMapId};
use crate::format::Method;
use crate::import::Importer;

/// One UV coordinate set: two floats per vertex plus its registry identity.
#[derive(Debug, Clone, PartialEq)]
pub struct UvMap {
    /// Unique name within the mesh's UV maps.
    pub name: String,
    /// Optional texture file reference.
    pub file_name: Option<String>,
    /// MG2 quantization step for this map.
    pub precision: f32,
    /// `2 * vertex_count` coordinates, tightly packed.
    pub coords: Vec<f32>,
}

impl UvMap {
    /// Creates a map with the default UV precision of 2^-12.
    #[must_use]
    pub fn new(name: &str, file_name: Option<&str>, coords: Vec<f32>) -> Self {
        Self {
            name: name.to_owned(),
            file_name: file_name.map(str::to_owned),
            precision: 1.0 / 4096.0,
            coords,
        }
    }
}

/// One custom attribute set: four floats per vertex plus its registry identity. Narrower
/// per-vertex data is stored zero-padded to four components, matching what the codec encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttribMap {
    /// Unique name within the mesh's attribute maps.
    pub name: String,
    /// MG2 quantization step for this map.
    pub precision: f32,
    /// `4 * vertex_count` values, tightly packed.
    pub values: Vec<f32>,
}

impl AttribMap {
    /// Creates a map with the default attribute precision of 2^-8.
    #[must_use]
    pub fn new(name: &str, values: Vec<f32>) -> Self {
        Self { name: name.to_owned(), precision: 1.0 / 256.0, values }
    }
}

/// Encode parameters for [`Mesh::write`]: the method plus the knobs MG2 quantizes with.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub method: Method,
    /// LZMA effort, 0..=9.
    pub compression_level: u32,
    pub vertex_precision: f32,
    pub normal_precision: f32,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            method: Method::Mg1,
            compression_level: 1,
            vertex_precision: 1.0 / 1024.0,
            normal_precision: 1.0 / 256.0,
        }
    }
}

impl SaveOptions {
    /// Options for one specific method, everything else default.
    #[must_use]
    pub fn with_method(method: Method) -> Self {
        Self { method, ..Self::default() }
    }
}

/// A triangle mesh with owned storage.
///
/// # Examples
/// ```
/// # use openctm::{Mesh, Method, SaveOptions};
/// let mesh = Mesh {
///     vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
///     indices: vec![0, 1, 2],
///     comment: Some("triangle".to_string()),
///     ..Mesh::default()
/// };
///
/// let mut stream = Vec::new();
/// mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg1))?;
///
/// let read = Mesh::read(&mut &stream[..])?;
/// assert_eq!(read.vertices, mesh.vertices);
/// assert_eq!(read.indices, mesh.indices);
/// assert_eq!(read.comment.as_deref(), Some("triangle"));
/// # Ok::<(), openctm::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// `3 * vertex_count` coordinates, tightly packed.
    pub vertices: Vec<f32>,
    /// `3 * triangle_count` corner indices, tightly packed.
    pub indices: Vec<u32>,
    /// Optional unit normals, `3 * vertex_count` when present.
    pub normals: Option<Vec<f32>>,
    pub uv_maps: Vec<UvMap>,
    pub attrib_maps: Vec<AttribMap>,
    /// File comment carried in the container header.
    pub comment: Option<String>,
}

impl Mesh {
    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Looks a UV map up by name.
    #[must_use]
    pub fn find_uv_map(&self, name: &str) -> Option<&UvMap> {
        self.uv_maps.iter().find(|map| map.name == name)
    }

    /// Looks an attribute map up by name.
    #[must_use]
    pub fn find_attrib_map(&self, name: &str) -> Option<&AttribMap> {
        self.attrib_maps.iter().find(|map| map.name == name)
    }

    /// Decodes one complete mesh from a stream.
    ///
    /// # Errors
    /// Anything the two-phase import surface reports; see [`Importer::read_header`] and
    /// [`Importer::read_body`].
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut importer = Importer::read_header(reader)?;
        let vertex_count = importer.vertex_count() as usize;
        let triangle_count = importer.triangle_count() as usize;

        let mut vertices = vec![0f32; vertex_count * 3];
        let mut indices = vec![0u32; triangle_count * 3];
        let mut normals =
            importer.has_normals().then(|| vec![0f32; vertex_count * 3]);
        let mut uv_buffers: Vec<Vec<f32>> =
            (0..importer.uv_map_count()).map(|_| vec![0f32; vertex_count * 2]).collect();
        let mut attrib_buffers: Vec<Vec<f32>> =
            (0..importer.attrib_map_count()).map(|_| vec![0f32; vertex_count * 4]).collect();

        importer.bind_vertices(ArrayMut::new(&mut vertices[..], 3)?)?;
        importer.bind_indices(ArrayMut::new(&mut indices[..], 3)?)?;
        if let Some(normals) = &mut normals {
            importer.bind_normals(ArrayMut::new(&mut normals[..], 3)?)?;
        }
        for (index, buffer) in uv_buffers.iter_mut().enumerate() {
            importer.bind_uv_map(UvMapId(index), ArrayMut::new(&mut buffer[..], 2)?)?;
        }
        for (index, buffer) in attrib_buffers.iter_mut().enumerate() {
            importer
                .bind_attrib_map(AttribMapId(index), ArrayMut::new(&mut buffer[..], 4)?)?;
        }

        importer.read_body(reader)?;

        let comment = importer.comment().map(str::to_owned);
        let uv_identities: Vec<(String, Option<String>, f32)> = (0..importer.uv_map_count())
            .map(|index| {
                let id = UvMapId(index);
                (
                    importer.uv_map_name(id).unwrap_or_default().to_owned(),
                    importer.uv_map_file_name(id).map(str::to_owned),
                    importer.uv_map_precision(id).unwrap_or(1.0 / 4096.0),
                )
            })
            .collect();
        let attrib_identities: Vec<(String, f32)> = (0..importer.attrib_map_count())
            .map(|index| {
                let id = AttribMapId(index);
                (
                    importer.attrib_map_name(id).unwrap_or_default().to_owned(),
                    importer.attrib_map_precision(id).unwrap_or(1.0 / 256.0),
                )
            })
            .collect();
        drop(importer);

        let uv_maps = uv_identities
            .into_iter()
            .zip(uv_buffers)
            .map(|((name, file_name, precision), coords)| UvMap {
                name,
                file_name,
                precision,
                coords,
            })
            .collect();
        let attrib_maps = attrib_identities
            .into_iter()
            .zip(attrib_buffers)
            .map(|((name, precision), values)| AttribMap { name, precision, values })
            .collect();

        Ok(Self { vertices, indices, normals, uv_maps, attrib_maps, comment })
    }

    /// Encodes this mesh into a stream with the given options.
    ///
    /// # Errors
    /// Anything the export surface reports; see [`Exporter::save`].
    pub fn write<W: Write>(&self, writer: &mut W, options: &SaveOptions) -> Result<()> {
        let mut exporter = Exporter::new();
        exporter.set_method(options.method);
        exporter.set_compression_level(options.compression_level)?;
        exporter.set_vertex_precision(options.vertex_precision)?;
        exporter.set_normal_precision(options.normal_precision)?;
        exporter.set_comment(self.comment.as_deref());

        exporter.bind_vertices(ArrayRef::new(&self.vertices[..], 3)?)?;
        exporter.bind_indices(ArrayRef::new(&self.indices[..], 3)?)?;
        if let Some(normals) = &self.normals {
            exporter.bind_normals(ArrayRef::new(&normals[..], 3)?)?;
        }
        for map in &self.uv_maps {
            let id = exporter.add_uv_map(
                &map.name,
                map.file_name.as_deref(),
                ArrayRef::new(&map.coords[..], 2)?,
            )?;
            exporter.set_uv_precision(id, map.precision)?;
        }
        for map in &self.attrib_maps {
            let id = exporter.add_attrib_map(&map.name, ArrayRef::new(&map.values[..], 4)?)?;
            exporter.set_attrib_precision(id, map.precision)?;
        }

        exporter.save(writer)
    }

    /// Loads a mesh from an OpenCTM file.
    ///
    /// # Errors
    /// Returns [`FileError`](crate::Error::FileError) if the file cannot be opened, otherwise
    /// whatever [`Mesh::read`] reports.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read(&mut BufReader::new(file))
    }

    /// Writes a mesh to an OpenCTM file.
    ///
    /// # Errors
    /// Returns [`FileError`](crate::Error::FileError) if the file cannot be created, otherwise
    /// whatever [`Mesh::write`] reports.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P, options: &SaveOptions) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer, options)?;
        writer.flush()?;
        Ok(())
    }
}
