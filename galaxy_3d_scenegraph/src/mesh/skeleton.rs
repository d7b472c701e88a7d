/// Skeleton - bone hierarchy shared by skinned meshes.
///
/// Bones are stored parents first. `prepare` computes the skinning matrices
/// (absolute pose * inverse bind pose) at most once per frame, however many
/// meshes use the skeleton.

use glam::Mat4;
use crate::error::Result;
use crate::engine_bail;

slotmap::new_key_type! {
    /// Stable key for a skeleton stored in the scene
    pub struct SkeletonKey;
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone (always lower than this bone's index)
    pub parent: Option<usize>,
    /// Pose relative to the parent
    pub local_matrix: Mat4,
    inverse_bind: Mat4,
}

impl Bone {
    pub fn new(name: &str, parent: Option<usize>, local_matrix: Mat4) -> Self {
        Self { name: name.to_string(), parent, local_matrix, inverse_bind: Mat4::IDENTITY }
    }

    /// Inverse of the absolute rest pose
    pub fn inverse_bind(&self) -> &Mat4 {
        &self.inverse_bind
    }
}

pub struct Skeleton {
    pub name: String,
    pub(crate) unique_id: u64,
    bones: Vec<Bone>,
    transform_matrices: Vec<Mat4>,
    prepared_frame: Option<u64>,
}

impl Skeleton {
    /// Build a skeleton whose rest pose is the bones' current local matrices
    ///
    /// # Errors
    ///
    /// Returns an error if a bone references a parent that does not precede it.
    pub fn new(name: &str, mut bones: Vec<Bone>) -> Result<Self> {
        let mut absolute: Vec<Mat4> = Vec::with_capacity(bones.len());
        for (index, bone) in bones.iter_mut().enumerate() {
            let world = match bone.parent {
                Some(parent) if parent < index => absolute[parent] * bone.local_matrix,
                Some(parent) => {
                    engine_bail!("galaxy3d::Skeleton",
                        "Skeleton '{}': bone '{}' has parent {} which does not precede it",
                        name, bone.name, parent);
                }
                None => bone.local_matrix,
            };
            bone.inverse_bind = world.inverse();
            absolute.push(world);
        }

        let count = bones.len();
        Ok(Self {
            name: name.to_string(),
            unique_id: 0,
            bones,
            transform_matrices: vec![Mat4::IDENTITY; count],
            prepared_frame: None,
        })
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Pose a bone; takes effect at the next frame's `prepare`
    pub fn set_bone_local_matrix(&mut self, index: usize, local_matrix: Mat4) -> bool {
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.local_matrix = local_matrix;
                self.prepared_frame = None;
                true
            }
            None => false,
        }
    }

    /// Compute skinning matrices for `frame`. Returns false when already
    /// prepared for that frame.
    pub fn prepare(&mut self, frame: u64) -> bool {
        if self.prepared_frame == Some(frame) {
            return false;
        }
        self.prepared_frame = Some(frame);

        let mut absolute: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let world = match bone.parent {
                Some(parent) => absolute[parent] * bone.local_matrix,
                None => bone.local_matrix,
            };
            absolute.push(world);
        }
        for (i, bone) in self.bones.iter().enumerate() {
            self.transform_matrices[i] = absolute[i] * bone.inverse_bind;
        }
        true
    }

    /// Skinning matrices of the last `prepare`, one per bone
    pub fn transform_matrices(&self) -> &[Mat4] {
        &self.transform_matrices
    }
}
