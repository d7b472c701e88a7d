/// BasicMaterial - a diffuse material with a defines-keyed effect cache.
///
/// The effect variant is selected by a list of `#define` lines (instancing,
/// bones, alpha test, depth pre-pass, diffuse texture). Each distinct
/// variant is created once and looked up by its joined defines afterwards.

use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use crate::graphics_device::{
    EffectDesc, EffectHandle, FillMode, GraphicsDevice, TextureHandle, UniformValue,
};
use crate::mesh::{Mesh, Skeleton, SubMesh};
use crate::rendering::PassState;
use crate::target::RenderTargetKey;
use super::material::Material;

const UNIFORMS: &[&str] = &[
    "world", "view", "viewProjection", "vEyePosition", "vDiffuseColor", "mBones",
];
const SAMPLERS: &[&str] = &["diffuseSampler"];

/// Uniforms of material-provided shadow depth effects
const SHADOW_DEPTH_UNIFORMS: &[&str] = &[
    "world", "mBones", "viewProjection", "diffuseMatrix", "lightData", "depthValues", "biasAndScale",
];

pub struct BasicMaterial {
    pub name: String,
    pub diffuse_color: Vec3,
    pub alpha: f32,
    pub diffuse_texture: Option<TextureHandle>,
    /// Discard fragments by the diffuse texture's alpha
    pub alpha_test: bool,
    pub back_face_culling: bool,
    pub fill_mode: FillMode,
    pub z_offset: f32,
    pub need_depth_pre_pass: bool,
    /// Render targets sampled by this material
    pub render_targets: Vec<RenderTargetKey>,
    /// Shader used instead of the generator's in shadow passes
    pub shadow_depth_shader: Option<String>,
    frozen: bool,
    effects: FxHashMap<String, EffectHandle>,
    shadow_effects: FxHashMap<String, EffectHandle>,
    /// Variants that reported ready at least once
    ready_variants: FxHashSet<EffectHandle>,
    current_effect: Option<EffectHandle>,
}

impl BasicMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            diffuse_color: Vec3::ONE,
            alpha: 1.0,
            diffuse_texture: None,
            alpha_test: false,
            back_face_culling: true,
            fill_mode: FillMode::Triangles,
            z_offset: 0.0,
            need_depth_pre_pass: false,
            render_targets: Vec::new(),
            shadow_depth_shader: None,
            frozen: false,
            effects: FxHashMap::default(),
            shadow_effects: FxHashMap::default(),
            ready_variants: FxHashSet::default(),
            current_effect: None,
        }
    }

    /// A frozen material trusts variants that were ready once
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of compiled variants
    pub fn variant_count(&self) -> usize {
        self.effects.len()
    }

    /// Defines selecting the effect variant for a draw
    pub fn prepare_defines(&self, mesh: &Mesh, skeleton: Option<&Skeleton>, use_instances: bool) -> Vec<String> {
        let mut defines = Vec::new();
        if use_instances {
            defines.push("#define INSTANCES".to_string());
        }
        match skeleton {
            Some(skeleton) if mesh.compute_bones_using_shaders => {
                defines.push("#define NUM_BONE_INFLUENCERS 4".to_string());
                defines.push(format!("#define BonesPerMesh {}", skeleton.bone_count() + 1));
            }
            _ => defines.push("#define NUM_BONE_INFLUENCERS 0".to_string()),
        }
        if self.diffuse_texture.is_some() {
            defines.push("#define DIFFUSE".to_string());
        }
        if self.need_alpha_testing() {
            defines.push("#define ALPHATEST".to_string());
        }
        if self.need_depth_pre_pass {
            defines.push("#define DEPTHPREPASS".to_string());
        }
        defines
    }

    fn effect_for(&mut self, defines: &[String], device: &mut dyn GraphicsDevice) -> Option<EffectHandle> {
        let key = defines.join("\n");
        if let Some(effect) = self.effects.get(&key) {
            return Some(*effect);
        }
        match device.create_effect(&EffectDesc::new("default", defines, UNIFORMS, SAMPLERS)) {
            Ok(effect) => {
                self.effects.insert(key, effect);
                Some(effect)
            }
            Err(e) => {
                crate::engine_warn!("galaxy3d::BasicMaterial",
                    "Material '{}': effect creation failed: {}", self.name, e);
                None
            }
        }
    }
}

impl Material for BasicMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready_for_submesh(
        &mut self,
        mesh: &Mesh,
        _sub_mesh: &SubMesh,
        skeleton: Option<&Skeleton>,
        use_instances: bool,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        let defines = self.prepare_defines(mesh, skeleton, use_instances);
        let Some(effect) = self.effect_for(&defines, device) else {
            return false;
        };
        self.current_effect = Some(effect);

        if self.frozen && self.ready_variants.contains(&effect) {
            return true;
        }
        if let Some(texture) = self.diffuse_texture {
            if !device.is_texture_ready(texture) {
                return false;
            }
        }
        if !device.is_effect_ready(effect) {
            return false;
        }
        self.ready_variants.insert(effect);
        true
    }

    fn effect(&self) -> Option<EffectHandle> {
        self.current_effect
    }

    fn bind_for_submesh(
        &mut self,
        world: &Mat4,
        mesh: &Mesh,
        _sub_mesh: &SubMesh,
        skeleton: Option<&Skeleton>,
        pass: &PassState,
        device: &mut dyn GraphicsDevice,
    ) {
        let Some(effect) = self.current_effect else { return };
        device.enable_effect(effect);
        device.set_uniform(effect, "world", UniformValue::Mat4(*world));
        device.set_uniform(effect, "view", UniformValue::Mat4(pass.view));
        device.set_uniform(effect, "viewProjection", UniformValue::Mat4(pass.transform));
        device.set_uniform(effect, "vEyePosition", UniformValue::Vec3(pass.eye_position));
        device.set_uniform(
            effect,
            "vDiffuseColor",
            UniformValue::Vec4(self.diffuse_color.extend(self.alpha * mesh.visibility)),
        );
        if let Some(texture) = self.diffuse_texture {
            device.set_texture(effect, "diffuseSampler", texture);
        }
        if let Some(skeleton) = skeleton {
            if mesh.compute_bones_using_shaders {
                device.set_uniform(
                    effect,
                    "mBones",
                    UniformValue::Mat4Array(skeleton.transform_matrices().to_vec()),
                );
            }
        }
        for binding in &pass.shadow_bindings {
            binding.bind(effect, device);
        }
    }

    fn bind_only_world_matrix(&mut self, world: &Mat4, device: &mut dyn GraphicsDevice) {
        if let Some(effect) = self.current_effect {
            device.set_uniform(effect, "world", UniformValue::Mat4(*world));
        }
    }

    fn render_target_textures(&self) -> &[RenderTargetKey] {
        &self.render_targets
    }

    fn need_alpha_blending_for_mesh(&self, mesh: &Mesh) -> bool {
        self.alpha < 1.0 || mesh.visibility < 1.0
    }

    fn need_alpha_testing(&self) -> bool {
        self.alpha_test && self.diffuse_texture.is_some()
    }

    fn need_depth_pre_pass(&self) -> bool {
        self.need_depth_pre_pass
    }

    fn alpha_test_texture(&self) -> Option<TextureHandle> {
        if self.need_alpha_testing() { self.diffuse_texture } else { None }
    }

    fn alpha(&self) -> f32 {
        self.alpha
    }

    fn back_face_culling(&self) -> bool {
        self.back_face_culling
    }

    fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    fn z_offset(&self) -> f32 {
        self.z_offset
    }

    fn shadow_depth_effect(&mut self, defines: &[String], device: &mut dyn GraphicsDevice) -> Option<EffectHandle> {
        let shader = self.shadow_depth_shader.as_deref()?;
        let key = defines.join("\n");
        if let Some(effect) = self.shadow_effects.get(&key) {
            return Some(*effect);
        }
        let desc = EffectDesc::new(shader, defines, SHADOW_DEPTH_UNIFORMS, &["diffuseSampler"]);
        let effect = device.create_effect(&desc).ok()?;
        self.shadow_effects.insert(key, effect);
        Some(effect)
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, effect) in self.effects.drain().chain(self.shadow_effects.drain()) {
            device.release_effect(effect);
        }
        self.ready_variants.clear();
        self.current_effect = None;
    }
}

#[cfg(test)]
#[path = "basic_material_tests.rs"]
mod tests;

