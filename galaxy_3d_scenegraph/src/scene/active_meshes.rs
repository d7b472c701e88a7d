/// Active mesh evaluation - selects what a camera draws.
///
/// Candidates come from the selection octree when one exists, otherwise from
/// every mesh; either way they are visited in collection order. A selected
/// mesh dispatches its submeshes into the scene's rendering manager. Frozen
/// evaluation keeps the last list and dispatch queues and only refreshes
/// world matrices.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::engine_debug;
use crate::camera::{Camera, CameraKey};
use crate::culling::{Frustum, Octree};
use crate::mesh::{activate, resolve_lod, Mesh, MeshKey, SubMeshRef};
use super::scene::{Scene, DEFAULT_OCTREE_CAPACITY, DEFAULT_OCTREE_MAX_DEPTH};

/// What evaluation needs from a camera
#[derive(Debug, Clone)]
pub(crate) struct CameraView {
    pub frustum: Frustum,
    pub layer_mask: u32,
    pub eye: Vec3,
}

impl CameraView {
    pub fn of(camera: &Camera) -> Self {
        Self {
            frustum: camera.frustum(),
            layer_mask: camera.layer_mask,
            eye: camera.global_position(),
        }
    }
}

/// Recompute the world matrix of `key` after its parents (once per evaluation)
pub(crate) fn update_world_matrix(
    meshes: &mut SlotMap<MeshKey, Mesh>,
    key: MeshKey,
    computed: &mut FxHashSet<MeshKey>,
) -> Option<Mat4> {
    if !computed.insert(key) {
        return meshes.get(key).map(|mesh| *mesh.world_matrix());
    }
    let parent = meshes.get(key)?.parent;
    let parent_world = parent.and_then(|parent| update_world_matrix(meshes, parent, computed));
    meshes.get_mut(key).map(|mesh| mesh.compute_world_matrix(parent_world.as_ref()))
}

impl Scene {
    /// Select the active meshes of `camera` under the current render id and
    /// fill the rendering manager.
    ///
    /// # Errors
    ///
    /// `NotFound` when the camera is unknown.
    pub fn evaluate_active_meshes(&mut self, camera: CameraKey) -> Result<()> {
        let Some(camera) = self.cameras.get(camera) else {
            return Err(Error::NotFound(format!("Camera {:?}", camera)));
        };
        let view = CameraView::of(camera);
        self.evaluate_active_meshes_for(&view);
        Ok(())
    }

    /// Meshes selected by the last evaluation, in collection order
    pub fn active_meshes(&self) -> &[MeshKey] {
        &self.active_meshes
    }

    pub(crate) fn evaluate_active_meshes_for(&mut self, view: &CameraView) {
        self.on_before_active_meshes_evaluation.notify(&());
        let render_id = self.render_id;
        let mut computed = FxHashSet::default();

        if self.active_meshes_frozen && self.frozen_evaluated {
            for index in 0..self.active_meshes.len() {
                update_world_matrix(&mut self.meshes, self.active_meshes[index], &mut computed);
            }
            self.animate_particles(view, false);
            self.on_after_active_meshes_evaluation.notify(&());
            return;
        }

        self.active_meshes.clear();
        self.rendering_manager.reset();
        self.bounding_box_renderer.reset();
        self.software_skinned_meshes.clear();
        self.active_skeletons.clear();
        self.processed_materials.clear();
        self.material_render_targets.clear();

        if self.selection_octree.is_some() {
            self.refresh_selection_octree(&mut computed);
        }

        let candidates: Vec<MeshKey> = match self.selection_octree.as_ref() {
            Some(octree) => {
                let selected: FxHashSet<MeshKey> = octree.select(&view.frustum).into_iter().collect();
                self.mesh_order.iter().copied().filter(|key| selected.contains(key)).collect()
            }
            None => self.mesh_order.clone(),
        };

        for key in candidates {
            let Some(mesh) = self.meshes.get(key) else { continue };
            if mesh.is_blocked() {
                continue;
            }
            self.total_vertices.add_count(mesh.total_vertices() as u64);
            if !mesh.is_ready() || !mesh.enabled || mesh.scaling.length_squared() == 0.0 {
                continue;
            }
            let is_instance = mesh.is_instance();

            update_world_matrix(&mut self.meshes, key, &mut computed);

            // ===== LOD =====
            let Some(target) = resolve_lod(&self.meshes, key, view.eye) else { continue };
            if target != key && !is_instance {
                let world = *self.meshes[key].world_matrix();
                if let Some(lod) = self.meshes.get_mut(target) {
                    lod.set_world_matrix(world);
                }
            }
            if !is_instance {
                self.meshes[key].pre_activate(render_id);
            }
            if let Some(target_mesh) = self.meshes.get_mut(target) {
                target_mesh.pre_activate(render_id);
            }

            // ===== VISIBILITY =====
            let mesh = &self.meshes[key];
            let selected = mesh.always_select_as_active_mesh
                || (mesh.is_visible
                    && mesh.visibility > 0.0
                    && mesh.layer_mask & view.layer_mask != 0
                    && mesh.is_in_frustum(&view.frustum));
            if !selected {
                continue;
            }

            self.active_meshes.push(key);
            if let Some(dispatched) = activate(&mut self.meshes, key, target, render_id, false) {
                self.active_mesh(key, dispatched, view);
            }
        }

        self.animate_particles(view, true);
        if self.config.sprites_enabled {
            for (index, sprites) in self.sprite_managers.iter().enumerate() {
                if sprites.layer_mask() & view.layer_mask != 0 {
                    self.rendering_manager.dispatch_sprites(index, sprites.rendering_group_id());
                }
            }
        }

        if self.active_meshes_frozen {
            self.frozen_evaluated = true;
        }
        self.on_after_active_meshes_evaluation.notify(&());
    }

    /// Register skeleton, bounding box and submeshes of a selected mesh.
    ///
    /// `source` is the evaluated mesh, `dispatched` the mesh whose
    /// submeshes are drawn (its LOD level, or the source of an instance).
    fn active_mesh(&mut self, source: MeshKey, dispatched: MeshKey, view: &CameraView) {
        let source_mesh = &self.meshes[source];

        if self.config.skeletons_enabled {
            if let Some(skeleton_key) = source_mesh.skeleton {
                if !self.active_skeletons.contains(&skeleton_key) {
                    self.active_skeletons.push(skeleton_key);
                    if let Some(skeleton) = self.skeletons.get_mut(skeleton_key) {
                        skeleton.prepare(self.frame_id);
                        self.active_bones.add_count(skeleton.bone_count() as u64);
                    }
                }
                if !source_mesh.compute_bones_using_shaders
                    && !self.software_skinned_meshes.contains(&dispatched)
                {
                    self.software_skinned_meshes.push(dispatched);
                }
            }
        }

        if self.config.force_show_bounding_boxes || source_mesh.show_bounding_box {
            self.bounding_box_renderer.queue(&source_mesh.bounding_info().bounding_box);
        }

        // ===== SUBMESHES =====
        let Some(mesh) = self.meshes.get(dispatched) else { return };
        let include_all = mesh.always_select_as_active_mesh
            || mesh.sub_meshes().len() == 1
            || source_mesh.is_instance()
            || !source_mesh.instances().is_empty();
        let candidates: Vec<usize> = match mesh.submeshes_octree() {
            Some(octree) if mesh.use_octree_for_rendering_selection => {
                let mut selected = octree.select(&view.frustum);
                selected.sort_unstable();
                selected
            }
            _ => (0..mesh.sub_meshes().len()).collect(),
        };

        for index in candidates {
            let Some(sub_mesh) = mesh.sub_meshes().get(index) else { continue };
            if !include_all && !sub_mesh.is_in_frustum(&view.frustum, mesh.culling_strategy) {
                continue;
            }
            let Some(material_key) = mesh.material_for(sub_mesh).or(self.default_material) else { continue };
            let Some(material) = self.materials.get(material_key) else { continue };

            if self.processed_materials.insert(material_key) {
                for &target in material.render_target_textures() {
                    if !self.material_render_targets.contains(&target) {
                        self.material_render_targets.push(target);
                    }
                }
            }
            self.active_indices.add_count(sub_mesh.index_count as u64);
            self.rendering_manager.dispatch(SubMeshRef::new(dispatched, index), mesh, Some(&**material));
        }
    }

    /// Animate started particle systems whose emitter is enabled
    fn animate_particles(&mut self, view: &CameraView, dispatch: bool) {
        if !self.config.particles_enabled {
            return;
        }
        for (index, system) in self.particle_systems.iter_mut().enumerate() {
            if !system.is_started() || system.layer_mask() & view.layer_mask == 0 {
                continue;
            }
            if let Some(emitter) = system.emitter() {
                if !self.meshes.get(emitter).is_some_and(|mesh| mesh.enabled) {
                    continue;
                }
            }
            system.animate();
            self.active_particles.add_count(system.active_count());
            if dispatch {
                self.rendering_manager.dispatch_particles(index, system.rendering_group_id());
            }
        }
    }

    // ========================================================================
    // Freezing & selection octree
    // ========================================================================

    /// Reuse the next evaluation's active meshes until unfrozen
    pub fn freeze_active_meshes(&mut self) {
        self.active_meshes_frozen = true;
        self.frozen_evaluated = false;
    }

    pub fn unfreeze_active_meshes(&mut self) {
        self.active_meshes_frozen = false;
        self.frozen_evaluated = false;
    }

    pub fn is_active_meshes_frozen(&self) -> bool {
        self.active_meshes_frozen
    }

    /// Build (or rebind) the selection octree over every mesh.
    ///
    /// World matrices are recomputed first; extents are the union of the
    /// resulting culling boxes. Meshes added later are inserted as they come,
    /// and meshes that move are relocated at the next evaluation.
    pub fn create_or_update_selection_octree(&mut self, capacity: usize, max_depth: u32) -> &Octree<MeshKey> {
        let mut computed = FxHashSet::default();
        for index in 0..self.mesh_order.len() {
            update_world_matrix(&mut self.meshes, self.mesh_order[index], &mut computed);
        }
        let entries: Vec<(MeshKey, _)> = self
            .mesh_order
            .iter()
            .map(|key| (*key, self.meshes[*key].bounding_info().culling_aabb()))
            .collect();
        let (min, max) = entries.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), (_, aabb)| (min.min(aabb.min), max.max(aabb.max)),
        );
        let (min, max) = if entries.is_empty() { (Vec3::ZERO, Vec3::ZERO) } else { (min, max) };

        let octree = self.selection_octree.get_or_insert_with(|| Octree::new(capacity, max_depth));
        if octree.capacity() != capacity.max(1) || octree.max_depth() != max_depth {
            *octree = Octree::new(capacity, max_depth);
        }
        octree.update(min, max, entries);
        engine_debug!("galaxy3d::Scene", "Selection octree: {} meshes in {} blocks",
            octree.entry_count(), octree.block_count());
        octree
    }

    /// Relocate the octree entries of meshes whose culling box left the box
    /// they were indexed with. LOD levels follow their master and are skipped.
    fn refresh_selection_octree(&mut self, computed: &mut FxHashSet<MeshKey>) {
        for index in 0..self.mesh_order.len() {
            let key = self.mesh_order[index];
            if self.meshes.get(key).map_or(true, |mesh| mesh.is_blocked()) {
                continue;
            }
            update_world_matrix(&mut self.meshes, key, computed);
            let bounds = self.meshes[key].bounding_info().culling_aabb();
            if let Some(octree) = self.selection_octree.as_mut() {
                if octree.refresh_entry(key, bounds) {
                    engine_debug!("galaxy3d::Scene", "Mesh '{}' relocated in the selection octree",
                        self.meshes[key].name);
                }
            }
        }
    }

    /// Selection octree with the default capacity and depth
    pub fn create_or_update_default_selection_octree(&mut self) -> &Octree<MeshKey> {
        self.create_or_update_selection_octree(DEFAULT_OCTREE_CAPACITY, DEFAULT_OCTREE_MAX_DEPTH)
    }

    pub fn selection_octree(&self) -> Option<&Octree<MeshKey>> {
        self.selection_octree.as_ref()
    }

    /// Drop the selection octree (no-op without one)
    pub fn dispose_selection_octree(&mut self) {
        self.selection_octree = None;
    }
}

#[cfg(test)]
#[path = "active_meshes_tests.rs"]
mod tests;
