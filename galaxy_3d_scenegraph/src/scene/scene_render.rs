/// Frame loop - one `render` call drives a frame:
///
/// 1. roll counters, animate, step physics, `on_before_render`
/// 2. scene-level custom render targets, procedural textures
/// 3. backbuffer clear and shadow generator collection
/// 4. every active camera (`render_for_camera`)
/// 5. intersection triggers, `on_after_render`, dispose sweep
///
/// A camera pass evaluates its active meshes, renders the queued render
/// targets and shadow maps, then draws layers, rendering groups, bounding
/// boxes and lens flares, optionally through the camera's post-processes.

use std::time::Instant;
use crate::error::{Error, Result};
use crate::{engine_error, engine_warn};
use crate::camera::{Camera, CameraKey};
use crate::graphics_device::{ClearFlags, GraphicsDevice};
use crate::rendering::{PassContext, PassState, PassStats};
use crate::shadows::{ShadowBinding, ShadowGeneratorKey};
use crate::target::{render_target_texture, RenderTargetKey};
use super::active_meshes::CameraView;
use super::scene::Scene;

/// Borrow the scene collections a pass needs, leaving the other fields free
macro_rules! pass_context {
    ($scene:expr, $device:expr, $state:expr) => {
        PassContext {
            device: $device,
            meshes: &mut $scene.meshes,
            materials: &mut $scene.materials,
            default_material: $scene.default_material,
            skeletons: &$scene.skeletons,
            particles: &mut $scene.particle_systems,
            sprites: &mut $scene.sprite_managers,
            state: $state,
            stats: PassStats::default(),
        }
    };
}

/// Render target queued for a camera pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameTarget {
    Texture(RenderTargetKey),
    Shadow(ShadowGeneratorKey),
}

impl Scene {
    /// Render one frame, animating by the wall-clock time since the last call
    pub fn render(&mut self) -> Result<()> {
        let now = Instant::now();
        let delta_ms = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64() * 1000.0);
        self.last_frame = Some(now);
        self.render_with_delta(delta_ms)
    }

    /// Render one frame with an explicit elapsed time (ms)
    ///
    /// # Errors
    ///
    /// Only for a disposed scene or a poisoned device lock. A missing camera
    /// is logged and ends the frame early.
    pub fn render_with_delta(&mut self, delta_ms: f64) -> Result<()> {
        if self.disposed {
            return Err(Error::InvalidOperation("render on a disposed scene".to_string()));
        }
        self.frame_id += 1;
        let frame_id = self.frame_id;
        self.roll_counters();

        // ===== ANIMATE =====
        if self.config.animations_enabled && !self.animatables.is_empty() {
            let delta = self.config.animation_delta(delta_ms);
            self.animatables.retain_mut(|animatable| animatable.animate(delta));
        }
        if self.config.physics_enabled {
            if let Some(physics) = self.physics_engine.as_mut() {
                physics.step(self.config.clamp_delta(delta_ms) / 1000.0);
            }
        }
        self.on_before_render.notify(&frame_id);

        let device_arc = self.graphics_device();
        let mut guard = Self::lock_device(&device_arc)?;
        let device: &mut dyn GraphicsDevice = &mut *guard;

        let cameras: Vec<CameraKey> = if self.active_cameras.is_empty() {
            self.active_camera.into_iter().collect()
        } else {
            self.active_cameras.clone()
        };

        // ===== CUSTOM RENDER TARGETS =====
        if self.config.render_targets_enabled && !self.custom_render_targets.is_empty() {
            self.on_before_render_targets_render.notify(&());
            for index in 0..self.custom_render_targets.len() {
                let key = self.custom_render_targets[index];
                self.render_texture_target(key, cameras.first().copied(), device);
            }
            self.on_after_render_targets_render.notify(&());
            self.render_id += 1;
            device.restore_default_framebuffer();
        }

        if self.config.procedural_textures_enabled {
            for texture in &mut self.procedural_textures {
                if texture.should_render() {
                    texture.render(device);
                }
            }
        }

        // ===== CLEAR =====
        let mut flags = ClearFlags::empty();
        if self.config.auto_clear {
            flags |= ClearFlags::COLOR;
        }
        if self.config.auto_clear_depth_and_stencil {
            flags |= ClearFlags::DEPTH | ClearFlags::STENCIL;
        }
        if !flags.is_empty() {
            device.clear(flags, self.config.clear_color);
        }

        self.collect_shadow_generators();

        // ===== CAMERAS =====
        if cameras.is_empty() {
            engine_error!("galaxy3d::Scene", "No camera defined");
            return Ok(());
        }
        for (index, &camera) in cameras.iter().enumerate() {
            if index > 0 {
                device.clear(ClearFlags::DEPTH | ClearFlags::STENCIL, self.config.clear_color);
            }
            self.render_camera(camera, device);
        }

        // ===== AFTER RENDER =====
        if self.config.check_intersections {
            self.check_intersections();
        }
        self.on_after_render.notify(&frame_id);

        for key in std::mem::take(&mut self.pending_dispose) {
            self.dispose_mesh(key, device);
        }
        Ok(())
    }

    /// Render a single camera pass outside of `render`
    pub fn render_for_camera(&mut self, camera: CameraKey) -> Result<()> {
        if !self.cameras.contains_key(camera) {
            return Err(Error::NotFound(format!("Camera {:?}", camera)));
        }
        let device_arc = self.graphics_device();
        let mut guard = Self::lock_device(&device_arc)?;
        self.render_camera(camera, &mut *guard);
        Ok(())
    }

    /// Shadow generators of enabled shadow lights, in light order
    fn collect_shadow_generators(&mut self) {
        self.frame_shadow_generators.clear();
        if !self.config.shadows_enabled {
            return;
        }
        for &light_key in &self.light_order {
            let Some(light) = self.lights.get(light_key) else { continue };
            if !light.enabled || !light.shadow_enabled {
                continue;
            }
            let Some(generator) = light.shadow_generator else { continue };
            if self.shadow_generators.get(generator).is_some_and(|g| !g.is_disposed()) {
                self.frame_shadow_generators.push(generator);
            }
        }
    }

    fn render_camera(&mut self, camera_key: CameraKey, device: &mut dyn GraphicsDevice) {
        let Some(camera) = self.cameras.get(camera_key) else {
            engine_error!("galaxy3d::Scene", "Camera {:?} does not exist", camera_key);
            return;
        };
        let view = CameraView::of(camera);
        let viewport = camera.viewport;
        device.set_viewport(viewport);
        self.render_id += 1;
        self.on_before_camera_render.notify(&camera_key);

        self.evaluate_active_meshes_for(&view);

        // ===== SOFTWARE SKINNING =====
        if self.config.skeletons_enabled {
            for index in 0..self.software_skinned_meshes.len() {
                let key = self.software_skinned_meshes[index];
                let Some(mesh) = self.meshes.get_mut(key) else { continue };
                let Some(skeleton) = mesh.skeleton.and_then(|s| self.skeletons.get(s)) else { continue };
                if let Err(e) = mesh.apply_skeleton(skeleton, device) {
                    engine_warn!("galaxy3d::Scene", "Skinning of '{}' failed: {}", mesh.name, e);
                }
            }
        }

        // ===== RENDER TARGETS & SHADOW MAPS =====
        if self.config.render_targets_enabled {
            let targets = self.frame_targets(camera_key);
            if !targets.is_empty() {
                self.on_before_render_targets_render.notify(&());
                for target in targets {
                    match target {
                        FrameTarget::Texture(key) => self.render_texture_target(key, Some(camera_key), device),
                        FrameTarget::Shadow(key) => self.render_shadow_map(key, camera_key, device),
                    }
                }
                self.on_after_render_targets_render.notify(&());
                self.render_id += 1;
                device.restore_default_framebuffer();
                device.set_viewport(viewport);
            }
        }

        let mut post_processes = if self.config.post_processes_enabled {
            self.cameras
                .get_mut(camera_key)
                .map(|camera| std::mem::take(&mut camera.post_processes))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let Some(camera) = self.cameras.get(camera_key) else { return };
        let mut state = PassState::for_camera(camera, self.render_id, device.caps());
        state.shadow_bindings = self.shadow_bindings(camera);
        let post_processing = self.post_process_manager.prepare_frame(&mut post_processes, device);

        // ===== DRAW =====
        self.on_before_draw_phase.notify(&camera_key);
        self.render_layers(true, view.layer_mask, device, &state);

        let mut ctx = pass_context!(self, &mut *device, state);
        self.rendering_manager.render(&mut ctx);
        let PassContext { state, stats, .. } = ctx;
        self.draw_calls.add_count(stats.draw_calls);

        let boxes = self.bounding_box_renderer.render(device, &state);
        self.draw_calls.add_count(boxes);
        if self.config.lens_flares_enabled {
            for system in &mut self.lens_flare_systems {
                if system.is_enabled() && system.layer_mask() & view.layer_mask != 0 {
                    system.render(device, &state);
                }
            }
        }
        self.render_layers(false, view.layer_mask, device, &state);
        self.on_after_draw_phase.notify(&camera_key);

        // ===== POST-PROCESS =====
        if post_processing {
            let draws = self.post_process_manager.finalize_frame(&mut post_processes, device);
            self.draw_calls.add_count(draws);
        }
        if self.config.post_processes_enabled {
            if let Some(camera) = self.cameras.get_mut(camera_key) {
                camera.post_processes = post_processes;
            }
        }
        self.on_after_camera_render.notify(&camera_key);
    }

    fn render_layers(&mut self, background: bool, layer_mask: u32, device: &mut dyn GraphicsDevice, state: &PassState) {
        if !self.config.layers_enabled {
            return;
        }
        for layer in &mut self.layers {
            if layer.is_background() == background && layer.layer_mask() & layer_mask != 0 {
                layer.render(device, state);
            }
        }
    }

    /// Shadow maps, material render targets, then the camera's own targets
    fn frame_targets(&self, camera_key: CameraKey) -> Vec<FrameTarget> {
        let mut targets: Vec<FrameTarget> = self
            .frame_shadow_generators
            .iter()
            .map(|key| FrameTarget::Shadow(*key))
            .collect();
        let camera_targets = self
            .cameras
            .get(camera_key)
            .map(|camera| camera.custom_render_targets.as_slice())
            .unwrap_or_default();
        for &key in self.material_render_targets.iter().chain(camera_targets) {
            let target = FrameTarget::Texture(key);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    /// Sampling data of every shadow map receivers may use
    fn shadow_bindings(&self, camera: &Camera) -> Vec<ShadowBinding> {
        if !self.config.shadows_enabled {
            return Vec::new();
        }
        self.light_order
            .iter()
            .enumerate()
            .filter_map(|(index, key)| {
                let light = self.lights.get(*key)?;
                if !light.enabled || !light.shadow_enabled {
                    return None;
                }
                let generator = self.shadow_generators.get(light.shadow_generator?)?;
                generator.bind_shadow_light(index, light, camera)
            })
            .collect()
    }

    /// Render a render target seen from its own camera (or `fallback`)
    fn render_texture_target(&mut self, key: RenderTargetKey, fallback: Option<CameraKey>, device: &mut dyn GraphicsDevice) {
        let Some(target) = self.render_targets.get_mut(key) else { return };
        let camera = target
            .active_camera
            .filter(|camera| self.cameras.contains_key(*camera))
            .or(fallback)
            .and_then(|camera| self.cameras.get(camera));
        let Some(camera) = camera else { return };
        if !target.should_render() {
            return;
        }

        self.render_id += 1;
        let mut state = PassState::for_camera(camera, self.render_id, device.caps());
        state.intermediate = true;
        let layer_mask = camera.layer_mask;
        let clear_color = self.config.clear_color;

        let mut ctx = pass_context!(self, &mut *device, state);
        render_target_texture(&mut ctx, target, &self.active_meshes, layer_mask, clear_color);
        self.render_id = ctx.state.render_id;
        self.draw_calls.add_count(ctx.stats.draw_calls);
    }

    fn render_shadow_map(&mut self, key: ShadowGeneratorKey, camera_key: CameraKey, device: &mut dyn GraphicsDevice) {
        let Some(generator) = self.shadow_generators.get_mut(key) else { return };
        let Some(light) = self.lights.get_mut(generator.light()) else { return };
        let Some(camera) = self.cameras.get(camera_key) else { return };

        self.render_id += 1;
        let state = PassState::for_camera(camera, self.render_id, device.caps());
        let mut ctx = pass_context!(self, &mut *device, state);
        generator.render(&mut ctx, light, camera, &mut self.post_process_manager);
        self.render_id = ctx.state.render_id;
        self.draw_calls.add_count(ctx.stats.draw_calls);
    }
}

#[cfg(test)]
#[path = "scene_render_tests.rs"]
mod tests;
