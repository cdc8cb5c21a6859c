use std::collections::{HashMap, HashSet, VecDeque};

use glam::Mat4;
use log::{trace, warn};

use crate::source::RawScene;

use super::{Skeleton, SkeletonError};

struct BoneSeed<'a> {
    name: &'a str,
    node: Option<usize>,
    bind_global: Mat4,
    geometry_offset: Mat4,
    linked: bool,
}

impl<'a> BoneSeed<'a> {
    fn from_node(scene: &'a RawScene, node: usize) -> Self {
        Self {
            name: scene.nodes[node].name.as_str(),
            node: Some(node),
            bind_global: scene.nodes[node].global_transform,
            geometry_offset: Mat4::IDENTITY,
            linked: false,
        }
    }
}

/// Every bone referenced by a cluster in first-seen order, then the
/// skeleton nodes above them. Without any clusters, every skeleton node.
fn collect_bones(scene: &RawScene) -> Vec<BoneSeed<'_>> {
    let mut seeds: Vec<BoneSeed> = Vec::new();
    let mut seed_by_name: HashMap<&str, usize> = HashMap::new();
    for cluster in scene.meshes.iter().flat_map(|mesh| mesh.clusters.iter()) {
        if cluster.bone.is_empty() {
            continue;
        }
        if let Some(&seed) = seed_by_name.get(cluster.bone.as_str()) {
            let seed = &mut seeds[seed];
            if !seed.linked {
                if let Some(link) = cluster.transform_link {
                    seed.bind_global = link;
                    seed.geometry_offset = cluster.transform.unwrap_or(Mat4::IDENTITY);
                    seed.linked = true;
                }
            }
            continue;
        }

        let node = scene.find_node(&cluster.bone);
        let bind_global = cluster
            .transform_link
            .or_else(|| node.map(|node| scene.nodes[node].global_transform))
            .unwrap_or(Mat4::IDENTITY);
        seed_by_name.insert(cluster.bone.as_str(), seeds.len());
        seeds.push(BoneSeed {
            name: cluster.bone.as_str(),
            node,
            bind_global,
            geometry_offset: cluster.transform.unwrap_or(Mat4::IDENTITY),
            linked: cluster.transform_link.is_some(),
        });
    }

    if seeds.is_empty() {
        return scene
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_bone && !node.name.is_empty())
            .filter(|(_, node)| seed_by_name.insert(node.name.as_str(), 0).is_none())
            .map(|(index, _)| BoneSeed::from_node(scene, index))
            .collect();
    }

    for weighted in 0..seeds.len() {
        let Some(start) = seeds[weighted].node else {
            continue;
        };
        let mut visited = HashSet::from([start]);
        let mut current = scene.nodes[start].parent;
        while let Some(index) = current {
            if !visited.insert(index) {
                break;
            }
            let Some(node) = scene.nodes.get(index) else {
                break;
            };
            let unseen = !seed_by_name.contains_key(node.name.as_str());
            if node.is_bone && !node.name.is_empty() && unseen {
                trace!("Adding unweighted skeleton node {:?}", node.name);
                seed_by_name.insert(node.name.as_str(), seeds.len());
                seeds.push(BoneSeed::from_node(scene, index));
            }
            current = node.parent;
        }
    }
    seeds
}

/// Walk raw parent links upward until a node that is itself a bone.
fn nearest_bone_ancestor(
    scene: &RawScene,
    node: usize,
    seed_by_node: &HashMap<usize, usize>,
) -> Option<usize> {
    let mut visited = HashSet::from([node]);
    let mut current = scene.nodes.get(node)?.parent;
    while let Some(index) = current {
        if !visited.insert(index) {
            warn!("Cycle in scene graph above node #{}, treating bone as root", node);
            return None;
        }
        let Some(raw) = scene.nodes.get(index) else {
            warn!("Node #{} has dangling parent #{}", node, index);
            return None;
        };
        if let Some(&seed) = seed_by_node.get(&index) {
            return Some(seed);
        }
        current = raw.parent;
    }
    None
}

/// Breadth-first order from the roots. Bones unreachable from any root
/// are appended in their original order.
fn topological_order(parents: &[Option<usize>]) -> Vec<usize> {
    let mut children = vec![Vec::new(); parents.len()];
    let mut queue = VecDeque::new();
    for (index, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(index),
            None => queue.push_back(index),
        }
    }

    let mut visited = vec![false; parents.len()];
    let mut order = Vec::with_capacity(parents.len());
    while let Some(index) = queue.pop_front() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        order.push(index);
        queue.extend(children[index].iter().filter(|child| !visited[**child]));
    }

    if order.len() != parents.len() {
        warn!(
            "{} bones unreachable from any root, appending them",
            parents.len() - order.len()
        );
        order.extend((0..parents.len()).filter(|index| !visited[*index]));
    }
    order
}

/// Build the bone registry from the skin clusters of every mesh in the scene.
pub fn build_skeleton(scene: &RawScene) -> Result<Skeleton, SkeletonError> {
    let seeds = collect_bones(scene);
    let seed_by_node: HashMap<usize, usize> = seeds
        .iter()
        .enumerate()
        .filter_map(|(index, seed)| seed.node.map(|node| (node, index)))
        .collect();
    let parents: Vec<Option<usize>> = seeds
        .iter()
        .map(|seed| {
            seed.node
                .and_then(|node| nearest_bone_ancestor(scene, node, &seed_by_node))
        })
        .collect();

    let mut skeleton = Skeleton::new();
    for index in topological_order(&parents) {
        let seed = &seeds[index];
        let parent = parents[index].and_then(|parent| {
            let found = skeleton.find_bone(seeds[parent].name);
            if found.is_none() {
                warn!(
                    "Bone {:?} precedes its parent {:?}, registering it as a root",
                    seed.name, seeds[parent].name
                );
            }
            found
        });
        let bone = skeleton.add_bone(seed.name, parent, seed.bind_global, seed.geometry_offset)?;
        trace!("Bone #{} {:?}, parent {:?}", bone, seed.name, parent);
    }
    Ok(skeleton)
}
