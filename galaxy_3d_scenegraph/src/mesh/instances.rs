/// Instance batches - which instances of a mesh draw with each submesh.
///
/// Visible instances are recorded per render id during activation. When a
/// submesh is rendered, the batch for the current render id is resolved
/// once; a repeated request within the same render id returns the cached
/// batch flagged `must_return` so the caller skips the duplicate draw.
///
/// Passes that find no list for their own render id fall back to a default
/// one: the id the instances were first registered under (main pass) or
/// the id recorded by `pre_activate_for_intermediate_rendering`
/// (render-target passes).

use rustc_hash::FxHashMap;
use super::instance_buffer::InstanceBuffer;
use super::mesh::{Mesh, MeshKey};

/// Resolved draw list of one submesh for one pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstancesBatch {
    /// Already resolved (and drawn) under this render id
    pub must_return: bool,
    /// The mesh itself draws along with its instances
    pub render_self: bool,
    /// Visible instances, in registration order
    pub instances: Vec<MeshKey>,
}

#[derive(Debug, Clone, Default)]
struct VisibleInstances {
    by_render_id: FxHashMap<u64, Vec<MeshKey>>,
    default_render_id: u64,
    self_default_render_id: u64,
    intermediate_default_render_id: u64,
}

/// Instancing state kept on a mesh between passes
pub(crate) struct InstanceDataStorage {
    visible_instances: Option<VisibleInstances>,
    /// Render id each submesh last resolved its batch for
    render_id_for_instances: FxHashMap<usize, u64>,
    /// Last batch resolved per submesh
    batch_cache: FxHashMap<usize, InstancesBatch>,
    pub(crate) buffer: InstanceBuffer,
}

impl InstanceDataStorage {
    pub(crate) fn new() -> Self {
        Self {
            visible_instances: None,
            render_id_for_instances: FxHashMap::default(),
            batch_cache: FxHashMap::default(),
            buffer: InstanceBuffer::new(),
        }
    }

    pub(crate) fn reset_visible_instances(&mut self) {
        self.visible_instances = None;
    }

    pub(crate) fn set_intermediate_default_render_id(&mut self, render_id: u64) {
        if let Some(visible) = self.visible_instances.as_mut() {
            visible.intermediate_default_render_id = render_id;
        }
    }

    pub(crate) fn register(&mut self, instance: MeshKey, render_id: u64, self_render_id: u64) {
        let visible = self.visible_instances.get_or_insert_with(|| VisibleInstances {
            default_render_id: render_id,
            self_default_render_id: self_render_id,
            ..VisibleInstances::default()
        });
        visible.by_render_id.entry(render_id).or_default().push(instance);
    }

    pub(crate) fn has_visible_instances(&self) -> bool {
        self.visible_instances
            .as_ref()
            .map_or(false, |v| v.by_render_id.values().any(|list| !list.is_empty()))
    }
}

/// Outcome of resolving a batch before it is committed
struct Resolution {
    batch: InstancesBatch,
    /// Render id the batch resolved under (when instances are tracked)
    resolved_render_id: Option<u64>,
}

impl Mesh {
    /// Resolve the instance batch of a submesh for the pass `render_id`.
    ///
    /// The first call for a submesh within a render id computes and records
    /// the batch; later calls return the same batch with `must_return` set.
    pub fn get_instances_render_list(&mut self, sub_mesh: usize, render_id: u64, intermediate: bool) -> InstancesBatch {
        let resolution = self.resolve_instances(sub_mesh, render_id, intermediate);
        if resolution.batch.must_return {
            return resolution.batch;
        }

        let data = &mut self.instance_data;
        if let Some(resolved) = resolution.resolved_render_id {
            data.render_id_for_instances.insert(sub_mesh, resolved);
        }
        data.batch_cache.insert(sub_mesh, resolution.batch.clone());
        resolution.batch
    }

    /// Same resolution as `get_instances_render_list` without recording it
    /// (used by depth pre-pass draws that precede the real draw).
    pub fn peek_instances_render_list(&self, sub_mesh: usize, render_id: u64, intermediate: bool) -> InstancesBatch {
        let mut batch = self.resolve_instances(sub_mesh, render_id, intermediate).batch;
        batch.must_return = false;
        batch
    }

    fn resolve_instances(&self, sub_mesh: usize, render_id: u64, intermediate: bool) -> Resolution {
        let only_for_instances = if intermediate {
            self.only_for_instances_intermediate
        } else {
            self.only_for_instances
        };
        let mut batch = InstancesBatch {
            must_return: false,
            render_self: !only_for_instances && self.enabled && self.is_visible,
            instances: Vec::new(),
        };

        let data = &self.instance_data;
        let Some(visible) = data.visible_instances.as_ref() else {
            return Resolution { batch, resolved_render_id: None };
        };

        let mut current = render_id;
        let default = if intermediate {
            visible.intermediate_default_render_id
        } else {
            visible.default_render_id
        };
        let mut self_render_id = self.render_id;
        let mut list = visible.by_render_id.get(&current).filter(|l| !l.is_empty());

        if list.is_none() && default != 0 {
            list = visible.by_render_id.get(&default).filter(|l| !l.is_empty());
            current = current.max(default);
            self_render_id = visible.self_default_render_id.max(current);
        }

        if let Some(list) = list {
            if data.render_id_for_instances.get(&sub_mesh) == Some(&current) {
                let mut cached = data.batch_cache.get(&sub_mesh).cloned().unwrap_or(batch);
                cached.must_return = true;
                return Resolution { batch: cached, resolved_render_id: Some(current) };
            }
            if current != self_render_id {
                batch.render_self = false;
            }
            batch.instances = list.clone();
        }

        Resolution { batch, resolved_render_id: Some(current) }
    }
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
