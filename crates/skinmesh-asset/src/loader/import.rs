use std::{collections::HashMap, ops::Range, sync::Arc};

use glam::{Mat4, Vec2, Vec3};
use log::{debug, warn};

use crate::{
    attribute::{normalize_or_default, reconstruct_normals, reconstruct_uvs},
    material::{unique_material_names, MaterialAsset},
    mesh::SkeletalMeshAsset,
    skeleton::{build_skeleton, Skeleton},
    source::{RawMesh, RawScene},
    subset::{partition_section, validate_subsets},
    vertex::{SkinnedVertex, VertexDeduplicator},
    weights::{BoneInfluences, InfluenceTable},
};

use super::{ImportError, ImportParams};

/// One source mesh prepared for merging into the combined buffers.
struct Section<'a> {
    mesh: &'a RawMesh,
    transform: Mat4,
    control_points: Range<usize>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
}

fn validate(scene: &RawScene) -> Result<(), ImportError> {
    if scene.meshes.is_empty() {
        return Err(ImportError::NoMeshes);
    }
    for mesh in &scene.meshes {
        let count = mesh.control_points.len();
        if count == 0 {
            return Err(ImportError::NoControlPoints {
                mesh: mesh.name.clone(),
            });
        }
        let corners = mesh.polygon_vertices.len();
        if corners == 0 || corners % 3 != 0 {
            return Err(ImportError::PolygonCountMismatch {
                mesh: mesh.name.clone(),
                count: corners,
            });
        }
        for (corner, &index) in mesh.polygon_vertices.iter().enumerate() {
            if usize::try_from(index).map_or(true, |index| index >= count) {
                return Err(ImportError::ControlPointOutOfRange {
                    mesh: mesh.name.clone(),
                    corner,
                    index,
                    count,
                });
            }
        }
    }
    Ok(())
}

/// Build the material list and, per mesh, the table from material slot to
/// material index. Meshes without slots get the default material.
fn collect_materials(scene: &RawScene) -> (Vec<Arc<MaterialAsset>>, Vec<Vec<usize>>) {
    let names = unique_material_names(&scene.materials);
    let mut materials: Vec<Arc<MaterialAsset>> = Vec::new();
    let mut by_source: HashMap<Option<usize>, usize> = HashMap::new();
    let mut slot_tables = Vec::with_capacity(scene.meshes.len());

    for mesh in &scene.meshes {
        let mut slots = Vec::with_capacity(mesh.material_slots.len().max(1));
        let sources: Vec<Option<usize>> = if mesh.material_slots.is_empty() {
            vec![None]
        } else {
            mesh.material_slots.clone()
        };
        for slot in sources {
            let source = slot.filter(|index| *index < scene.materials.len());
            if let (Some(slot), None) = (slot, source) {
                warn!(
                    "Mesh {:?} refers to missing material #{}, using default material",
                    mesh.name, slot
                );
            }
            let index = *by_source.entry(source).or_insert_with(|| {
                let material = match source {
                    Some(source) => MaterialAsset {
                        name: Some(names[source].clone()),
                        ..MaterialAsset::from_raw(&scene.materials[source], scene.directory.as_deref())
                    },
                    None => MaterialAsset::default(),
                };
                materials.push(Arc::new(material));
                materials.len() - 1
            });
            slots.push(index);
        }
        slot_tables.push(slots);
    }
    (materials, slot_tables)
}

fn accumulate_clusters(
    table: &mut InfluenceTable,
    skeleton: &Skeleton,
    mesh: &RawMesh,
    control_points: Range<usize>,
) {
    for cluster in &mesh.clusters {
        let Some(bone) = skeleton.find_bone(&cluster.bone) else {
            warn!(
                "Cluster in mesh {:?} refers to unknown bone {:?}, dropping its influences",
                mesh.name, cluster.bone
            );
            continue;
        };
        let dropped = table.add_cluster(
            control_points.clone(),
            bone as u32,
            &cluster.indices,
            &cluster.weights,
        );
        if dropped > 0 {
            warn!(
                "Dropped {} influences of bone {:?} in mesh {:?}",
                dropped, cluster.bone, mesh.name
            );
        }
    }
}

/// Convert a raw scene into a single skeletal mesh.
///
/// Only structural problems fail the import. Everything else is patched
/// with a default and logged.
pub fn import_scene(scene: &RawScene, params: &ImportParams) -> Result<SkeletalMeshAsset, ImportError> {
    validate(scene)?;

    let skeleton = build_skeleton(scene)?;
    let (materials, slot_tables) = collect_materials(scene);

    let mut table = InfluenceTable::default();
    let mut sections = Vec::with_capacity(scene.meshes.len());
    for mesh in &scene.meshes {
        let transform = if params.apply_mesh_transform {
            scene.mesh_transform(mesh)
        } else {
            Mat4::IDENTITY
        };
        let control_points = table.extend(mesh.control_points.len());
        accumulate_clusters(&mut table, &skeleton, mesh, control_points.clone());
        let normals = reconstruct_normals(mesh)
            .into_iter()
            .map(|normal| normalize_or_default(transform.transform_vector3(normal)))
            .collect();
        let uvs = reconstruct_uvs(mesh, params.flip_uv_v);
        sections.push(Section {
            mesh,
            transform,
            control_points,
            normals,
            uvs,
        });
    }
    let influences = table.normalize(params.influence_limit(), params.weight_epsilon);
    let unweighted = if skeleton.is_empty() {
        BoneInfluences::new()
    } else {
        BoneInfluences::root()
    };

    let corners = sections
        .iter()
        .map(|section| section.mesh.polygon_vertices.len())
        .sum();
    let mut dedup = VertexDeduplicator::with_capacity(corners);
    let mut subsets = Vec::new();
    for (section, slots) in sections.iter().zip(&slot_tables) {
        let index_start = dedup.index_count() as u32;
        for (corner, &control_point) in section.mesh.polygon_vertices.iter().enumerate() {
            let control_point = control_point as usize;
            let position = section
                .transform
                .transform_point3(Vec3::from_array(section.mesh.control_points[control_point]));
            let point = &influences[section.control_points.start + control_point];
            let point = if point.is_empty() { &unweighted } else { point };
            dedup.push(SkinnedVertex::new(
                position,
                section.normals[corner],
                section.uvs[corner],
                point,
            ));
        }
        subsets.extend(partition_section(
            &section.mesh.material_mapping,
            section.mesh.polygon_count(),
            index_start,
            |slot| slots.get(slot).copied(),
        ));
    }
    let (vertices, indices) = dedup.finish();
    let subsets = validate_subsets(subsets, indices.len());
    let bounds = SkeletalMeshAsset::compute_bounds(&vertices, &skeleton);

    let name = params.mesh_name.clone().or_else(|| {
        scene
            .meshes
            .iter()
            .map(|mesh| mesh.name.as_str())
            .find(|name| !name.is_empty())
            .map(str::to_string)
    });
    debug!(
        "Imported mesh {:?}: {} vertices from {} corners, {} subsets, {} bones, {} materials",
        name,
        vertices.len(),
        corners,
        subsets.len(),
        skeleton.len(),
        materials.len()
    );

    Ok(SkeletalMeshAsset {
        name,
        vertices,
        indices,
        subsets,
        materials,
        skeleton: Arc::new(skeleton),
        bounds,
    })
}
