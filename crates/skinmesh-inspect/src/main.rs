use std::{env, path::PathBuf, process, sync::Arc};

use glam::Mat4;
use log::info;
use serde::Serialize;
use skinmesh::SkinnedMeshInstance;
use skinmesh_asset::{
    loader::{load_scene, ImportParams},
    mesh::{Aabb, SkeletalMeshAsset},
    source::json::JsonSceneSource,
};

#[derive(Debug, Default)]
struct Options {
    path: Option<PathBuf>,
    params: ImportParams,
    rotate_root: Option<f32>,
    json: bool,
}

#[derive(Debug, Serialize)]
struct BoundsReport {
    min: [f32; 3],
    max: [f32; 3],
}

impl From<Aabb> for BoundsReport {
    fn from(value: Aabb) -> Self {
        Self {
            min: value.min.to_array(),
            max: value.max.to_array(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubsetReport {
    material: usize,
    material_name: Option<String>,
    index_start: u32,
    index_count: u32,
}

#[derive(Debug, Serialize)]
struct BoneReport {
    name: String,
    parent: Option<usize>,
    degenerate: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    name: Option<String>,
    vertices: usize,
    indices: usize,
    triangles: usize,
    bounds: BoundsReport,
    subsets: Vec<SubsetReport>,
    bones: Vec<BoneReport>,
    skinned_bounds: Option<BoundsReport>,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} <scene.json> [--max-influences N] [--no-flip-v] \
         [--apply-mesh-transform] [--rotate-root DEG] [--json]"
    );
}

fn parse_args(program: &str, args: impl Iterator<Item = String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut iter = args;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(program);
                return Ok(None);
            }
            "--max-influences" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--max-influences requires a count".to_string())?;
                options.params.max_influences = value
                    .parse::<usize>()
                    .map_err(|_| "--max-influences expects a positive integer".to_string())?;
            }
            "--rotate-root" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--rotate-root requires an angle in degrees".to_string())?;
                options.rotate_root = Some(
                    value
                        .parse::<f32>()
                        .map_err(|_| "--rotate-root expects a number".to_string())?,
                );
            }
            "--no-flip-v" => options.params.flip_uv_v = false,
            "--apply-mesh-transform" => options.params.apply_mesh_transform = true,
            "--json" => options.json = true,
            _ => {
                if options.path.is_none() {
                    options.path = Some(PathBuf::from(arg));
                } else {
                    print_usage(program);
                    return Err(format!("unexpected argument: {arg}"));
                }
            }
        }
    }
    Ok(Some(options))
}

/// Bounds after turning every root bone about Y by `degrees`.
fn skinned_bounds(mesh: Arc<SkeletalMeshAsset>, degrees: f32) -> Aabb {
    let mut instance = SkinnedMeshInstance::new(mesh.clone()).without_normals();
    let rotation = Mat4::from_rotation_y(degrees.to_radians());
    for root in mesh.skeleton.roots() {
        let local = mesh.skeleton.bones()[root].local_bind;
        instance.set_local_transform(root, rotation * local);
    }
    instance.update();
    Aabb::from_points(instance.positions().iter().copied())
}

fn report(mesh: Arc<SkeletalMeshAsset>, rotate_root: Option<f32>) -> Report {
    let subsets = mesh
        .subsets
        .iter()
        .map(|subset| SubsetReport {
            material: subset.material,
            material_name: mesh
                .subset_material(subset)
                .and_then(|material| material.name.clone()),
            index_start: subset.index_start,
            index_count: subset.index_count,
        })
        .collect();
    let bones = mesh
        .skeleton
        .bones()
        .iter()
        .map(|bone| BoneReport {
            name: bone.name.clone(),
            parent: bone.parent,
            degenerate: bone.inverse_bind().is_none(),
        })
        .collect();
    Report {
        name: mesh.name.clone(),
        vertices: mesh.vertex_count(),
        indices: mesh.indices.len(),
        triangles: mesh.triangle_count(),
        bounds: mesh.bounds.into(),
        subsets,
        bones,
        skinned_bounds: rotate_root.map(|degrees| skinned_bounds(mesh.clone(), degrees).into()),
    }
}

fn print_report(report: &Report) {
    println!("Mesh: {}", report.name.as_deref().unwrap_or("(unnamed)"));
    println!(
        "Vertices: {}, indices: {}, triangles: {}",
        report.vertices, report.indices, report.triangles
    );
    println!("Bounds: {:?} .. {:?}", report.bounds.min, report.bounds.max);
    if let Some(bounds) = &report.skinned_bounds {
        println!("Skinned bounds: {:?} .. {:?}", bounds.min, bounds.max);
    }

    println!("Subsets: {}", report.subsets.len());
    for (index, subset) in report.subsets.iter().enumerate() {
        println!(
            "  [{index}] material {} ({}) indices {}..{}",
            subset.material,
            subset.material_name.as_deref().unwrap_or("default"),
            subset.index_start,
            subset.index_start + subset.index_count
        );
    }

    println!("Bones: {}", report.bones.len());
    for (index, bone) in report.bones.iter().enumerate() {
        let parent = bone
            .parent
            .map_or_else(|| "-".to_string(), |parent| parent.to_string());
        let flag = if bone.degenerate { " (degenerate bind pose)" } else { "" };
        println!("  [{index}] {} parent {parent}{flag}", bone.name);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args
        .next()
        .unwrap_or_else(|| "skinmesh-inspect".to_string());

    let Some(options) = parse_args(&program, args)? else {
        return Ok(());
    };
    let Some(path) = options.path else {
        print_usage(&program);
        return Err("missing scene file path".to_string());
    };

    let mut source = JsonSceneSource::new(".");
    let mesh = load_scene(&mut source, &path, &options.params)
        .map_err(|err| format!("failed to import {}: {err}", path.display()))?;
    info!("Imported {}", path.display());

    let report = report(Arc::new(mesh), options.rotate_root);
    if options.json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|err| format!("failed to serialize report: {err}"))?;
        println!("{text}");
    } else {
        print_report(&report);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::parse_args;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|arg| arg.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(
            "inspect",
            args(&["model.json", "--max-influences", "2", "--no-flip-v", "--rotate-root", "90", "--json"]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(options.path.unwrap().to_str(), Some("model.json"));
        assert_eq!(options.params.max_influences, 2);
        assert!(!options.params.flip_uv_v);
        assert!(!options.params.apply_mesh_transform);
        assert_eq!(options.rotate_root, Some(90.0));
        assert!(options.json);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args("inspect", args(&["--max-influences", "many"])).is_err());
        assert!(parse_args("inspect", args(&["a.json", "b.json"])).is_err());
        assert!(parse_args("inspect", args(&["--help"])).unwrap().is_none());
    }
}
