use std::collections::HashSet;

use crate::source::{RawMaterial, RawTexture};

/// Resolved location of a texture. Nothing is loaded at import time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub path: String,
    pub file_name: String,
}

impl TextureInfo {
    /// Resolve `texture` against the scene directory.
    ///
    /// A relative file name is joined onto `directory`, an absolute one is
    /// kept as is. Backslashes are normalized to forward slashes.
    pub fn resolve(directory: Option<&str>, texture: &RawTexture) -> Option<Self> {
        let relative = texture
            .relative_file_name
            .as_deref()
            .filter(|relative| !relative.is_empty());
        let path = match (relative, directory) {
            (Some(relative), Some(directory)) if !directory.is_empty() => {
                format!("{}/{}", directory.trim_end_matches(['/', '\\']), relative)
            }
            (Some(relative), _) => relative.to_string(),
            (None, _) => texture.file_name.clone(),
        };
        let path = path.replace('\\', "/");
        if path.is_empty() {
            return None;
        }
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Some(Self { path, file_name })
    }
}

/// Lighting parameters of a material.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialAssetData {
    /// Metallic-roughness workflow.
    Pbr {
        base_color_factor: [f32; 4],
        base_color_texture: Option<TextureInfo>,
        metallic_factor: f32,
        roughness_factor: f32,
        metallic_texture: Option<TextureInfo>,
        roughness_texture: Option<TextureInfo>,
    },
    /// Classic diffuse/specular lighting.
    BlinnPhong {
        ambient_color: [f32; 3],
        diffuse_color: [f32; 3],
        specular_color: [f32; 3],
        shininess: f32,
        diffuse_texture: Option<TextureInfo>,
        specular_texture: Option<TextureInfo>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MaterialAlphaMode {
    #[default]
    Opaque,
    Blend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAsset {
    pub name: Option<String>,
    pub data: MaterialAssetData,
    pub normal_texture: Option<TextureInfo>,
    pub occlusion_texture: Option<TextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    pub opacity_texture: Option<TextureInfo>,
    pub emissive_factor: [f32; 3],
    pub opacity: f32,
    pub alpha_mode: MaterialAlphaMode,
}

impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            name: None,
            data: MaterialAssetData::BlinnPhong {
                ambient_color: [0.1, 0.1, 0.1],
                diffuse_color: [1.0, 1.0, 1.0],
                specular_color: [0.0, 0.0, 0.0],
                shininess: 1.0,
                diffuse_texture: None,
                specular_texture: None,
            },
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            opacity_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            opacity: 1.0,
            alpha_mode: MaterialAlphaMode::Opaque,
        }
    }
}

#[inline]
fn scale_color(color: [f32; 3], factor: Option<f32>) -> [f32; 3] {
    let factor = factor.unwrap_or(1.0);
    color.map(|channel| channel * factor)
}

#[inline]
fn pad_color_vec3_to_vec4(color: [f32; 3], alpha: f32) -> [f32; 4] {
    [color[0], color[1], color[2], alpha]
}

impl MaterialAsset {
    pub fn is_pbr(raw: &RawMaterial) -> bool {
        raw.base_color.is_some() || raw.metallic.is_some() || raw.roughness.is_some()
    }

    /// Convert a source material, resolving textures against `directory`.
    pub fn from_raw(raw: &RawMaterial, directory: Option<&str>) -> Self {
        let texture = |texture: &Option<RawTexture>| {
            texture
                .as_ref()
                .and_then(|texture| TextureInfo::resolve(directory, texture))
        };

        let opacity = 1.0 - raw.transparency_factor.unwrap_or(0.0).clamp(0.0, 1.0);
        let alpha_mode = if opacity < 1.0 {
            MaterialAlphaMode::Blend
        } else {
            MaterialAlphaMode::Opaque
        };
        let base_color = raw.base_color.or(raw.diffuse).unwrap_or([1.0, 1.0, 1.0]);
        let base_color = scale_color(base_color, raw.diffuse_factor);

        let data = if Self::is_pbr(raw) {
            MaterialAssetData::Pbr {
                base_color_factor: pad_color_vec3_to_vec4(base_color, opacity),
                base_color_texture: texture(&raw.textures.base_color),
                metallic_factor: raw.metallic.unwrap_or(0.0),
                roughness_factor: raw.roughness.unwrap_or(1.0),
                metallic_texture: texture(&raw.textures.metallic),
                roughness_texture: texture(&raw.textures.roughness),
            }
        } else {
            MaterialAssetData::BlinnPhong {
                ambient_color: base_color.map(|channel| channel * 0.1),
                diffuse_color: base_color,
                specular_color: scale_color(
                    raw.specular.unwrap_or([0.0, 0.0, 0.0]),
                    raw.specular_factor,
                ),
                shininess: raw.shininess.unwrap_or(1.0),
                diffuse_texture: texture(&raw.textures.base_color),
                specular_texture: texture(&raw.textures.specular),
            }
        };

        Self {
            name: Some(raw.name.clone()),
            data,
            normal_texture: texture(&raw.textures.normal),
            occlusion_texture: texture(&raw.textures.occlusion),
            emissive_texture: texture(&raw.textures.emissive),
            opacity_texture: texture(&raw.textures.opacity),
            emissive_factor: scale_color(raw.emissive.unwrap_or([0.0, 0.0, 0.0]), raw.emissive_factor),
            opacity,
            alpha_mode,
        }
    }
}

/// Names for `materials` with collisions suffixed `_1`, `_2`, ... in order.
pub fn unique_material_names(materials: &[RawMaterial]) -> Vec<String> {
    let mut taken = HashSet::new();
    materials
        .iter()
        .map(|material| {
            let mut name = material.name.clone();
            let mut suffix = 1;
            while taken.contains(&name) {
                name = format!("{}_{}", material.name, suffix);
                suffix += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}
