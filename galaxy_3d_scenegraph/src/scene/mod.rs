/// Scene module - the scene graph and its frame loop

mod active_meshes;
mod intersections;
mod scene;
mod scene_render;

pub use intersections::IntersectionEvent;
pub use scene::{Scene, DEFAULT_OCTREE_CAPACITY, DEFAULT_OCTREE_MAX_DEPTH};
pub use crate::config::SceneConfig;

#[cfg(test)]
pub(crate) mod test_fixtures;
