/// Mesh module - geometry, meshes, instances, skeletons and submesh drawing

mod activation;
mod geometry;
mod instance_buffer;
mod instances;
mod mesh;
mod mesh_renderer;
mod skeleton;
mod skinning;
mod sub_mesh;

pub use geometry::{Geometry, VertexData, VERTEX_STRIDE_FLOATS};
pub use instance_buffer::InstanceBuffer;
pub use instances::InstancesBatch;
pub use mesh::{IntersectionTrigger, LodLevel, Mesh, MeshKey, MeshKind};
pub use skeleton::{Bone, Skeleton, SkeletonKey};
pub use sub_mesh::{SubMesh, SubMeshRef};

pub(crate) use activation::{activate, resolve_lod};
pub(crate) use mesh_renderer::{process_rendering, render_submesh, submesh_draw_call};
