//! Byte-level container checks and malformed-stream rejection.
#![allow(unused_crate_dependencies)]

use openctm::{Error, Mesh, Method, SaveOptions};

fn triangle_mesh() -> Mesh {
    Mesh {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        indices: vec![0, 1, 2],
        ..Mesh::default()
    }
}

/// Hand-builds a v6 container header with no comment and no maps.
fn header_bytes(method: &[u8; 4], vertex_count: u32, triangle_count: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"OCTM");
    bytes.extend_from_slice(&6u32.to_le_bytes());
    bytes.extend_from_slice(method);
    for value in [vertex_count, triangle_count, 0, 0, 0, 0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[test]
fn raw_triangle_has_the_documented_byte_layout() {
    let mesh = triangle_mesh();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Raw)).unwrap();

    let mut expected = header_bytes(b"RAW\0", 3, 1);
    expected.extend_from_slice(b"INDX");
    for index in [0u32, 1, 2] {
        expected.extend_from_slice(&index.to_le_bytes());
    }
    expected.extend_from_slice(b"VERT");
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        expected.extend_from_slice(&value.to_le_bytes());
    }
    assert_eq!(stream, expected);
}

#[test]
fn unknown_method_tag_is_rejected_before_any_decode() {
    let stream = header_bytes(b"XYZ\0", 3, 1);
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn zero_vertex_count_is_rejected() {
    let stream = header_bytes(b"RAW\0", 0, 1);
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn zero_triangle_count_is_rejected() {
    let stream = header_bytes(b"MG1\0", 3, 0);
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn wrong_format_version_is_reported() {
    let mut stream = header_bytes(b"RAW\0", 3, 1);
    stream[4..8].copy_from_slice(&5u32.to_le_bytes());
    assert!(matches!(
        Mesh::read(&mut &stream[..]),
        Err(Error::UnsupportedFormatVersion { version: 5 })
    ));
}

#[test]
fn sections_out_of_order_are_rejected() {
    let mut stream = header_bytes(b"RAW\0", 3, 1);
    //RAW expects INDX first
    stream.extend_from_slice(b"VERT");
    stream.extend_from_slice(&[0u8; 9 * 4]);
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn truncated_streams_are_file_errors() {
    let mesh = triangle_mesh();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Raw)).unwrap();
    stream.truncate(stream.len() - 6);

    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::FileError { .. })));
}

#[test]
fn non_finite_raw_payloads_are_invalid_meshes() {
    let mut stream = header_bytes(b"RAW\0", 3, 1);
    stream.extend_from_slice(b"INDX");
    for index in [0u32, 1, 2] {
        stream.extend_from_slice(&index.to_le_bytes());
    }
    stream.extend_from_slice(b"VERT");
    for value in [f32::NAN, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        stream.extend_from_slice(&value.to_le_bytes());
    }
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::InvalidMesh)));
}

#[test]
fn out_of_range_raw_indices_are_invalid_meshes() {
    let mut stream = header_bytes(b"RAW\0", 3, 1);
    stream.extend_from_slice(b"INDX");
    for index in [0u32, 1, 7] {
        stream.extend_from_slice(&index.to_le_bytes());
    }
    stream.extend_from_slice(b"VERT");
    for value in [0.0f32; 9] {
        stream.extend_from_slice(&value.to_le_bytes());
    }
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::InvalidMesh)));
}

/// Offsets into an MG2 stream written with no comment and no maps: the fixed container header
/// is 36 bytes, then "MG2H", then two precisions, the box, and the divisions.
const MG2_VERTEX_PRECISION_OFFSET: usize = 40;
const MG2_BOX_MAX_OFFSET: usize = 60;
const MG2_DIVISION_OFFSET: usize = 72;

fn mg2_stream() -> Vec<u8> {
    let mesh = Mesh {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.5],
        indices: vec![0, 1, 2],
        ..Mesh::default()
    };
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg2)).unwrap();
    assert_eq!(&stream[36..40], b"MG2H");
    stream
}

#[test]
fn mg2_non_positive_precision_is_rejected() {
    let mut stream = mg2_stream();
    stream[MG2_VERTEX_PRECISION_OFFSET..MG2_VERTEX_PRECISION_OFFSET + 4]
        .copy_from_slice(&(-1.0f32).to_le_bytes());
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn mg2_inverted_bounding_box_is_rejected() {
    let mut stream = mg2_stream();
    stream[MG2_BOX_MAX_OFFSET..MG2_BOX_MAX_OFFSET + 4]
        .copy_from_slice(&(-5.0f32).to_le_bytes());
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn mg2_zero_grid_division_is_rejected() {
    let mut stream = mg2_stream();
    stream[MG2_DIVISION_OFFSET..MG2_DIVISION_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(Mesh::read(&mut &stream[..]), Err(Error::BadFormat)));
}

#[test]
fn comments_and_map_registry_live_in_the_header() {
    let mut mesh = triangle_mesh();
    mesh.comment = Some("hello".to_string());
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Raw)).unwrap();

    //Comment string sits directly after the fixed fields
    assert_eq!(&stream[32..36], &5u32.to_le_bytes());
    assert_eq!(&stream[36..41], b"hello");
    assert_eq!(&stream[41..45], b"INDX");
}

#[test]
fn save_rejects_an_invalid_mesh_without_writing() {
    let mesh = Mesh {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        // Index out of range
        indices: vec![0, 1, 9],
        ..Mesh::default()
    };
    let mut stream = Vec::new();
    let result = mesh.write(&mut stream, &SaveOptions::default());
    assert!(matches!(result, Err(Error::InvalidMesh)));
    assert!(stream.is_empty());
}
