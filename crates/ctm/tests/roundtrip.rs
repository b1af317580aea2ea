//! End-to-end encode/decode coverage for all three methods.
#![allow(unused_crate_dependencies)]

use openctm::array::{ArrayMut, ArrayRef};
use openctm::{AttribMap, Error, Exporter, Importer, Mesh, Method, SaveOptions, UvMap};

/// One right triangle in the xy plane.
fn triangle_mesh() -> Mesh {
    Mesh {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        indices: vec![0, 1, 2],
        ..Mesh::default()
    }
}

/// The unit cube with 12 triangles, outward winding, in canonical triangle order.
fn cube_mesh() -> Mesh {
    let vertices = vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, //
        0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0, //
        1.0, 0.0, 1.0, //
        1.0, 1.0, 1.0, //
        0.0, 1.0, 1.0,
    ];
    let mut indices = vec![
        0, 3, 2, 0, 2, 1, // bottom
        4, 5, 6, 4, 6, 7, // top
        0, 1, 5, 0, 5, 4, // front
        2, 3, 7, 2, 7, 6, // back
        0, 4, 7, 0, 7, 3, // left
        1, 2, 6, 1, 6, 5, // right
    ];
    canonicalize(&mut indices);
    Mesh { vertices, indices, ..Mesh::default() }
}

/// Rotates each triangle so the smallest index leads and sorts by (first, second), the order
/// the lossless methods normalize to.
fn canonicalize(indices: &mut [u32]) {
    let mut triangles: Vec<[u32; 3]> =
        indices.chunks_exact(3).map(|tri| [tri[0], tri[1], tri[2]]).collect();
    for triangle in &mut triangles {
        if triangle[1] < triangle[0] && triangle[1] < triangle[2] {
            *triangle = [triangle[1], triangle[2], triangle[0]];
        } else if triangle[2] < triangle[0] && triangle[2] < triangle[1] {
            *triangle = [triangle[2], triangle[0], triangle[1]];
        }
    }
    triangles.sort_by(|a, b| a[0].cmp(&b[0]).then(a[1].cmp(&b[1])));
    for (slot, triangle) in indices.chunks_exact_mut(3).zip(&triangles) {
        slot.copy_from_slice(triangle);
    }
}

/// Area-weighted averaged vertex normals, the same construction the smooth predictor uses.
fn averaged_normals(vertices: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0f32; vertices.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] =
            [triangle[0] as usize * 3, triangle[1] as usize * 3, triangle[2] as usize * 3];
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
        let length =
            (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        if length > 0.0 {
            for component in &mut normal {
                *component /= length;
            }
        }
        for &corner in &[a, b, c] {
            for component in 0..3 {
                normals[corner + component] += normal[component];
            }
        }
    }
    for slot in normals.chunks_exact_mut(3) {
        let length = (slot[0] * slot[0] + slot[1] * slot[1] + slot[2] * slot[2]).sqrt();
        if length > 0.0 {
            for component in slot {
                *component /= length;
            }
        }
    }
    normals
}

/// Full-featured cube: normals, one UV map with a texture reference, one attribute map.
fn decorated_cube() -> Mesh {
    let mut mesh = cube_mesh();
    mesh.normals = Some(averaged_normals(&mesh.vertices, &mesh.indices));
    let coords: Vec<f32> = (0..8).flat_map(|v| {
        let base = v as usize * 3;
        [mesh.vertices[base], mesh.vertices[base + 2]]
    }).collect();
    mesh.uv_maps = vec![UvMap::new("diffuse", Some("cube.png"), coords)];
    let values: Vec<f32> =
        (0..8).flat_map(|v| [v as f32 / 8.0, 0.25, 0.5, 1.0]).collect();
    mesh.attrib_maps = vec![AttribMap::new("occlusion", values)];
    mesh.comment = Some("unit cube".to_string());
    mesh
}

/// Pairs every decoded vertex with the closest original one; panics if the match is ambiguous
/// at the given tolerance.
fn nearest_vertex_map(original: &[f32], decoded: &[f32], tolerance: f32) -> Vec<usize> {
    decoded
        .chunks_exact(3)
        .map(|point| {
            let (index, distance) = original
                .chunks_exact(3)
                .enumerate()
                .map(|(index, candidate)| {
                    let distance = point
                        .iter()
                        .zip(candidate)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f32>()
                        .sqrt();
                    (index, distance)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap();
            assert!(distance <= tolerance, "vertex strayed {distance} from any original");
            index
        })
        .collect()
}

#[test]
fn raw_roundtrip_is_identity() {
    let mesh = decorated_cube();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Raw)).unwrap();

    let decoded = Mesh::read(&mut &stream[..]).unwrap();
    assert_eq!(decoded, mesh);
}

#[test]
fn mg1_roundtrip_is_identity_for_canonical_meshes() {
    let mesh = decorated_cube();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg1)).unwrap();

    let decoded = Mesh::read(&mut &stream[..]).unwrap();
    assert_eq!(decoded, mesh);
}

#[test]
fn mg1_preserves_the_triangle_set_of_unsorted_meshes() {
    let mut mesh = cube_mesh();
    //Scramble the canonical order and rotate some corners
    mesh.indices.chunks_exact_mut(3).for_each(|tri| tri.rotate_left(1));
    let scrambled = mesh.indices.clone();

    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg1)).unwrap();
    let decoded = Mesh::read(&mut &stream[..]).unwrap();

    assert_eq!(decoded.vertices, mesh.vertices);
    let mut expected = scrambled;
    canonicalize(&mut expected);
    assert_eq!(decoded.indices, expected);
}

#[test]
fn mg1_is_lossless_on_awkward_floats() {
    let mut mesh = triangle_mesh();
    mesh.vertices = vec![
        1.0e-30, -0.0, 3.141_592_7, 1.000_000_1, f32::MIN_POSITIVE, -1.0e30, 0.1, 0.2, 0.3,
    ];
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg1)).unwrap();

    let decoded = Mesh::read(&mut &stream[..]).unwrap();
    //Bit-exact, including the negative zero
    for (left, right) in decoded.vertices.iter().zip(mesh.vertices.iter()) {
        assert_eq!(left.to_bits(), right.to_bits());
    }
}

#[test]
fn mg2_cube_stays_within_precision_bounds() {
    let mesh = decorated_cube();
    let vertex_precision = 1.0 / 1024.0;
    let normal_precision = 1.0 / 256.0;

    let options = SaveOptions {
        method: Method::Mg2,
        vertex_precision,
        normal_precision,
        ..SaveOptions::default()
    };
    let mut stream = Vec::new();
    mesh.write(&mut stream, &options).unwrap();
    let decoded = Mesh::read(&mut &stream[..]).unwrap();

    assert_eq!(decoded.vertex_count(), 8);
    assert_eq!(decoded.triangle_count(), 12);

    //MG2 reorders vertices, so compare through the nearest original
    let mapping = nearest_vertex_map(&mesh.vertices, &decoded.vertices, 0.01);
    for (element, &original) in mapping.iter().enumerate() {
        for component in 0..3 {
            let error = (decoded.vertices[element * 3 + component]
                - mesh.vertices[original * 3 + component])
                .abs();
            assert!(error <= vertex_precision, "position error {error}");
        }
    }

    //The triangle set survives re-indexing
    let mut original_triangles = mesh.indices.clone();
    canonicalize(&mut original_triangles);
    let mut decoded_triangles: Vec<u32> = decoded
        .indices
        .iter()
        .map(|&index| mapping[index as usize] as u32)
        .collect();
    canonicalize(&mut decoded_triangles);
    assert_eq!(decoded_triangles, original_triangles);

    //Normals: no flips, angular error within a small multiple of the precision
    let original_normals = mesh.normals.as_ref().unwrap();
    let decoded_normals = decoded.normals.as_ref().unwrap();
    for (element, &original) in mapping.iter().enumerate() {
        let restored = &decoded_normals[element * 3..element * 3 + 3];
        let source = &original_normals[original * 3..original * 3 + 3];
        let dot: f32 = restored.iter().zip(source).map(|(a, b)| a * b).sum();
        assert!(dot > 0.0, "normal flipped");

        let restored_length: f32 =
            restored.iter().map(|value| value * value).sum::<f32>().sqrt();
        let angle = (dot / restored_length).clamp(-1.0, 1.0).acos();
        assert!(angle <= 3.0 * normal_precision + 1e-4, "normal error {angle}");
    }

    //UV and attribute coordinates respect their own precision
    let uv_precision = mesh.uv_maps[0].precision;
    for (element, &original) in mapping.iter().enumerate() {
        for component in 0..2 {
            let error = (decoded.uv_maps[0].coords[element * 2 + component]
                - mesh.uv_maps[0].coords[original * 2 + component])
                .abs();
            assert!(error <= uv_precision, "uv error {error}");
        }
    }
    let attrib_precision = mesh.attrib_maps[0].precision;
    for (element, &original) in mapping.iter().enumerate() {
        for component in 0..4 {
            let error = (decoded.attrib_maps[0].values[element * 4 + component]
                - mesh.attrib_maps[0].values[original * 4 + component])
                .abs();
            assert!(error <= attrib_precision, "attribute error {error}");
        }
    }

    //Registry identity and precisions survive
    assert_eq!(decoded.uv_maps[0].name, "diffuse");
    assert_eq!(decoded.uv_maps[0].file_name.as_deref(), Some("cube.png"));
    assert!((decoded.uv_maps[0].precision - uv_precision).abs() < 1e-12);
    assert_eq!(decoded.attrib_maps[0].name, "occlusion");
    assert_eq!(decoded.comment.as_deref(), Some("unit cube"));
}

#[test]
fn mg2_encoding_is_deterministic() {
    let mesh = decorated_cube();
    let options = SaveOptions::with_method(Method::Mg2);

    let mut first = Vec::new();
    mesh.write(&mut first, &options).unwrap();
    let mut second = Vec::new();
    mesh.write(&mut second, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn mg2_handles_a_degenerate_bounding_box() {
    let mesh = Mesh {
        vertices: vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
        indices: vec![0, 1, 2],
        ..Mesh::default()
    };
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg2)).unwrap();

    let decoded = Mesh::read(&mut &stream[..]).unwrap();
    //The grid collapses onto the point, restoring it exactly
    assert_eq!(decoded.vertices, mesh.vertices);
}

#[test]
fn strided_and_integer_typed_bindings_encode_the_same_mesh() {
    //Interleaved [x y z u v] vertex records, u16 indices
    let interleaved: [f32; 15] = [
        0.0, 0.0, 0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, 1.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 1.0,
    ];
    let indices: [u16; 3] = [0, 1, 2];

    let mut exporter = Exporter::new();
    exporter.set_method(Method::Raw);
    exporter
        .bind_vertices(ArrayRef::with_stride(&interleaved[..], 3, 5 * 4).unwrap())
        .unwrap();
    exporter.bind_indices(ArrayRef::new(&indices[..], 3).unwrap()).unwrap();
    exporter
        .add_uv_map("uv", None, ArrayRef::with_stride(&interleaved[3..], 2, 5 * 4).unwrap())
        .unwrap();

    let mut stream = Vec::new();
    exporter.save(&mut stream).unwrap();

    let decoded = Mesh::read(&mut &stream[..]).unwrap();
    assert_eq!(decoded.vertices, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(decoded.indices, vec![0, 1, 2]);
    assert_eq!(decoded.uv_maps[0].coords, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn decode_into_wider_float_buffers() {
    let mesh = triangle_mesh();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Raw)).unwrap();

    let mut reader = &stream[..];
    let mut importer = Importer::read_header(&mut reader).unwrap();
    let mut positions = vec![0f64; 9];
    let mut triangles = vec![0u32; 9];
    importer.bind_vertices(ArrayMut::new(&mut positions[..], 3).unwrap()).unwrap();
    importer.bind_indices(ArrayMut::new(&mut triangles[..], 3).unwrap()).unwrap();
    importer.read_body(&mut reader).unwrap();

    assert_eq!(positions[3], 1.0);
    assert_eq!(positions[7], 1.0);
}

#[test]
fn two_phase_import_exposes_header_before_binding() {
    let mesh = decorated_cube();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::with_method(Method::Mg2)).unwrap();

    let mut reader = &stream[..];
    let mut importer = Importer::read_header(&mut reader).unwrap();
    assert_eq!(importer.method(), Method::Mg2);
    assert_eq!(importer.vertex_count(), 8);
    assert_eq!(importer.triangle_count(), 12);
    assert!(importer.has_normals());
    assert_eq!(importer.comment(), Some("unit cube"));

    let uv = importer.find_uv_map("diffuse").expect("registered uv map");
    assert_eq!(importer.uv_map_file_name(uv), Some("cube.png"));
    assert!(importer.find_uv_map("missing").is_none());
    //Quantization parameters only exist once the body has been decoded
    assert!(importer.uv_map_precision(uv).is_none());
    assert!(importer.vertex_precision().is_none());

    let mut positions = vec![0f32; 8 * 3];
    let mut triangles = vec![0u32; 12 * 3];
    importer.bind_vertices(ArrayMut::new(&mut positions[..], 3).unwrap()).unwrap();
    importer.bind_indices(ArrayMut::new(&mut triangles[..], 3).unwrap()).unwrap();
    importer.read_body(&mut reader).unwrap();

    assert_eq!(importer.vertex_precision(), Some(1.0 / 1024.0));
    assert_eq!(importer.uv_map_precision(uv), Some(1.0 / 4096.0));
}

#[test]
fn unbound_optional_sections_are_decoded_and_discarded() {
    let mesh = decorated_cube();
    for method in [Method::Raw, Method::Mg1, Method::Mg2] {
        let mut stream = Vec::new();
        mesh.write(&mut stream, &SaveOptions::with_method(method)).unwrap();

        let mut reader = &stream[..];
        let mut importer = Importer::read_header(&mut reader).unwrap();
        let mut positions = vec![0f32; 8 * 3];
        let mut triangles = vec![0u32; 12 * 3];
        importer.bind_vertices(ArrayMut::new(&mut positions[..], 3).unwrap()).unwrap();
        importer.bind_indices(ArrayMut::new(&mut triangles[..], 3).unwrap()).unwrap();
        importer.read_body(&mut reader).unwrap();
    }
}

#[test]
fn read_body_without_mandatory_bindings_is_invalid_operation() {
    let mesh = triangle_mesh();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::default()).unwrap();

    let mut reader = &stream[..];
    let mut importer = Importer::read_header(&mut reader).unwrap();
    assert!(matches!(importer.read_body(&mut reader), Err(Error::InvalidOperation)));
}

#[test]
fn undersized_bindings_are_rejected() {
    let mesh = cube_mesh();
    let mut stream = Vec::new();
    mesh.write(&mut stream, &SaveOptions::default()).unwrap();

    let mut reader = &stream[..];
    let mut importer = Importer::read_header(&mut reader).unwrap();
    let mut too_small = vec![0f32; 4 * 3];
    assert!(matches!(
        importer.bind_vertices(ArrayMut::new(&mut too_small[..], 3).unwrap()),
        Err(Error::InvalidArgument)
    ));
}
