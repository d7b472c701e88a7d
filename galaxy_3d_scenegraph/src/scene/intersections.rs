/// Intersection triggers - enter/exit events between watched mesh pairs

use crate::mesh::MeshKey;
use super::scene::Scene;

/// Emitted on `Scene::on_intersection` when a watched pair starts
/// (`entered`) or stops intersecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEvent {
    pub mesh: MeshKey,
    pub other: MeshKey,
    pub entered: bool,
}

impl Scene {
    /// Test every registered trigger and notify the transitions, in mesh order
    pub(crate) fn check_intersections(&mut self) {
        let mut events = Vec::new();
        for &key in &self.mesh_order {
            let Some(mesh) = self.meshes.get(key) else { continue };
            if mesh.intersection_triggers.is_empty() {
                continue;
            }
            let changes: Vec<(usize, bool)> = mesh
                .intersection_triggers
                .iter()
                .enumerate()
                .filter_map(|(index, trigger)| {
                    let other = self.meshes.get(trigger.other)?;
                    let now = mesh.intersects_mesh(other, trigger.precise);
                    (now != trigger.intersecting).then_some((index, now))
                })
                .collect();
            if changes.is_empty() {
                continue;
            }

            let Some(mesh) = self.meshes.get_mut(key) else { continue };
            for (index, entered) in changes {
                let trigger = &mut mesh.intersection_triggers[index];
                trigger.intersecting = entered;
                events.push(IntersectionEvent { mesh: key, other: trigger.other, entered });
            }
        }

        for event in &events {
            self.on_intersection.notify(event);
        }
    }
}
