/// Material module - the material capability and a basic implementation

mod material;
mod basic_material;

pub use material::{Material, MaterialKey};
pub use basic_material::BasicMaterial;
