//! Mesh integrity checking, run before every encode and after every decode.

use openctm_core::prelude::*;
use snafu::prelude::*;

use crate::error::{InvalidMeshSnafu, Result};

/// Checks the invariants every mesh must satisfy: non-empty, every index inside the vertex
/// range, and every float in every array finite.
///
/// The same routine guards both directions: an exporter refuses to write a broken mesh, and an
/// importer refuses to hand one back even if the stream itself was well-formed.
pub(crate) fn check_mesh(
    vertices: &ArrayRef<'_>, indices: &ArrayRef<'_>, normals: Option<&ArrayRef<'_>>,
    uv_maps: &[ArrayRef<'_>], attrib_maps: &[ArrayRef<'_>], vertex_count: usize,
    triangle_count: usize,
) -> Result<()> {
    ensure!(vertex_count >= 1 && triangle_count >= 1, InvalidMeshSnafu);

    for element in 0..triangle_count {
        for corner in 0..3 {
            ensure!(
                (indices.get_i(element, corner) as usize) < vertex_count,
                InvalidMeshSnafu
            );
        }
    }

    for element in 0..vertex_count {
        for component in 0..3 {
            ensure!(vertices.get_f(element, component).is_finite(), InvalidMeshSnafu);
            if let Some(normals) = normals {
                ensure!(normals.get_f(element, component).is_finite(), InvalidMeshSnafu);
            }
        }
    }

    for map in uv_maps {
        for element in 0..vertex_count {
            for component in 0..2 {
                ensure!(map.get_f(element, component).is_finite(), InvalidMeshSnafu);
            }
        }
    }

    for map in attrib_maps {
        for element in 0..vertex_count {
            for component in 0..4 {
                ensure!(map.get_f(element, component).is_finite(), InvalidMeshSnafu);
            }
        }
    }

    Ok(())
}
