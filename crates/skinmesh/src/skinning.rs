//! Blend bind vertices by their bones' skinning matrices.
//!
//! Every vertex is independent of every other, so with the `parallel`
//! feature the buffers are split across the rayon pool. Both paths produce
//! bit-identical output.

use glam::{Mat4, Vec3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use skinmesh_asset::vertex::SkinnedVertex;

/// Applied weights summing to no more than this leave a vertex at its bind
/// position.
pub const SKINNING_WEIGHT_EPSILON: f32 = 1e-8;

fn influences<'a>(
    vertex: &'a SkinnedVertex,
    matrices: &'a [Mat4],
) -> impl Iterator<Item = (Mat4, f32)> + 'a {
    vertex
        .bones
        .iter()
        .zip(&vertex.weights)
        .filter(|(_, &weight)| weight > 0.0)
        .filter_map(move |(&bone, &weight)| matrices.get(bone as usize).map(|matrix| (*matrix, weight)))
}

/// Skinned position of `vertex`. Influences with a bone outside `matrices`
/// are skipped.
pub fn skin_position(vertex: &SkinnedVertex, matrices: &[Mat4]) -> Vec3 {
    let bind = vertex.position();
    let mut position = Vec3::ZERO;
    let mut total = 0.0;
    for (matrix, weight) in influences(vertex, matrices) {
        position += matrix.transform_point3(bind) * weight;
        total += weight;
    }
    if total > SKINNING_WEIGHT_EPSILON {
        position
    } else {
        bind
    }
}

/// Skinned unit normal of `vertex`, or the bind normal when nothing applies.
pub fn skin_normal(vertex: &SkinnedVertex, matrices: &[Mat4]) -> Vec3 {
    let bind = vertex.normal();
    let mut normal = Vec3::ZERO;
    let mut total = 0.0;
    for (matrix, weight) in influences(vertex, matrices) {
        normal += matrix.transform_vector3(bind) * weight;
        total += weight;
    }
    if total > SKINNING_WEIGHT_EPSILON {
        normal.try_normalize().unwrap_or(bind)
    } else {
        bind
    }
}

pub fn skin_vertex(vertex: &SkinnedVertex, matrices: &[Mat4]) -> (Vec3, Vec3) {
    (skin_position(vertex, matrices), skin_normal(vertex, matrices))
}

/// Skin `vertices` into `positions` and, when given, `normals`.
///
/// Output slices are written up to the shortest of the buffers.
pub fn skin_vertices(
    vertices: &[SkinnedVertex],
    matrices: &[Mat4],
    positions: &mut [Vec3],
    normals: Option<&mut [Vec3]>,
) {
    #[cfg(feature = "parallel")]
    match normals {
        Some(normals) => positions
            .par_iter_mut()
            .zip(normals.par_iter_mut())
            .zip(vertices.par_iter())
            .for_each(|((position, normal), vertex)| {
                (*position, *normal) = skin_vertex(vertex, matrices);
            }),
        None => positions
            .par_iter_mut()
            .zip(vertices.par_iter())
            .for_each(|(position, vertex)| *position = skin_position(vertex, matrices)),
    }

    #[cfg(not(feature = "parallel"))]
    match normals {
        Some(normals) => {
            for ((position, normal), vertex) in positions.iter_mut().zip(normals.iter_mut()).zip(vertices) {
                (*position, *normal) = skin_vertex(vertex, matrices);
            }
        }
        None => {
            for (position, vertex) in positions.iter_mut().zip(vertices) {
                *position = skin_position(vertex, matrices);
            }
        }
    }
}
