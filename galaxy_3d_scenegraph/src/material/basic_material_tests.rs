use std::sync::Arc;
use glam::{Mat4, Vec3, Vec4};
use crate::graphics_device::mock_graphics_device::{DeviceCommand, MockGraphicsDevice};
use crate::graphics_device::{DeviceCaps, TextureHandle, UniformValue};
use crate::mesh::{Bone, Geometry, Mesh, Skeleton};
use crate::rendering::PassState;
use crate::scene::test_fixtures::cube_data;
use super::*;

fn cube_mesh(device: &mut MockGraphicsDevice) -> Mesh {
    let geometry = Geometry::new("cube", cube_data(), device).unwrap();
    Mesh::new("cube", Arc::new(geometry))
}

fn two_bones() -> Skeleton {
    Skeleton::new("rig", vec![
        Bone::new("root", None, Mat4::IDENTITY),
        Bone::new("arm", Some(0), Mat4::from_translation(Vec3::Y)),
    ]).unwrap()
}

fn ready(material: &mut BasicMaterial, mesh: &Mesh, use_instances: bool, device: &mut MockGraphicsDevice) -> bool {
    let sub_mesh = mesh.sub_meshes()[0].clone();
    material.is_ready_for_submesh(mesh, &sub_mesh, None, use_instances, device)
}

// ============================================================================
// DEFINES
// ============================================================================

#[test]
fn test_prepare_defines_for_plain_mesh() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    let material = BasicMaterial::new("plain");
    assert_eq!(material.prepare_defines(&mesh, None, false), vec!["#define NUM_BONE_INFLUENCERS 0"]);
}

#[test]
fn test_prepare_defines_follow_options() {
    let mut device = MockGraphicsDevice::new();
    let mut mesh = cube_mesh(&mut device);
    let skeleton = two_bones();
    let mut material = BasicMaterial::new("full");
    material.diffuse_texture = Some(TextureHandle(3));
    material.alpha_test = true;
    material.need_depth_pre_pass = true;

    let defines = material.prepare_defines(&mesh, Some(&skeleton), true);
    assert_eq!(defines, vec![
        "#define INSTANCES",
        "#define NUM_BONE_INFLUENCERS 4",
        "#define BonesPerMesh 3",
        "#define DIFFUSE",
        "#define ALPHATEST",
        "#define DEPTHPREPASS",
    ]);

    // CPU skinning needs no bone defines
    mesh.compute_bones_using_shaders = false;
    assert!(material.prepare_defines(&mesh, Some(&skeleton), false).contains(&"#define NUM_BONE_INFLUENCERS 0".to_string()));
}

#[test]
fn test_alpha_test_requires_texture() {
    let mut material = BasicMaterial::new("cutout");
    material.alpha_test = true;
    assert!(!material.need_alpha_testing());
    assert!(material.alpha_test_texture().is_none());

    material.diffuse_texture = Some(TextureHandle(4));
    assert!(material.need_alpha_testing());
    assert_eq!(material.alpha_test_texture(), Some(TextureHandle(4)));
}

#[test]
fn test_blending_follows_alpha_and_visibility() {
    let mut device = MockGraphicsDevice::new();
    let mut mesh = cube_mesh(&mut device);
    let mut material = BasicMaterial::new("glass");
    assert!(!material.need_alpha_blending_for_mesh(&mesh));
    mesh.visibility = 0.9;
    assert!(material.need_alpha_blending_for_mesh(&mesh));
    mesh.visibility = 1.0;
    material.alpha = 0.3;
    assert!(material.need_alpha_blending_for_mesh(&mesh));
}

// ============================================================================
// READINESS & VARIANTS
// ============================================================================

#[test]
fn test_variants_are_created_once() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    let mut material = BasicMaterial::new("cached");

    assert!(ready(&mut material, &mesh, false, &mut device));
    assert!(ready(&mut material, &mesh, false, &mut device));
    assert_eq!(material.variant_count(), 1);
    assert_eq!(device.created_effect_count(), 1);

    assert!(ready(&mut material, &mesh, true, &mut device));
    assert_eq!(material.variant_count(), 2);
    let effect = material.effect().unwrap();
    assert!(device.effect_desc(effect).unwrap().defines.contains("INSTANCES"));
}

#[test]
fn test_readiness_waits_for_effect_and_texture() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    device.effect_compile_polls = 1;
    device.pending_textures.push(TextureHandle(9));
    let mut material = BasicMaterial::new("textured");
    material.diffuse_texture = Some(TextureHandle(9));

    assert!(!ready(&mut material, &mesh, false, &mut device));
    device.pending_textures.clear();
    assert!(!ready(&mut material, &mesh, false, &mut device));
    assert!(ready(&mut material, &mesh, false, &mut device));
}

#[test]
fn test_frozen_material_trusts_ready_variants() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    let mut material = BasicMaterial::new("frozen");
    material.diffuse_texture = Some(TextureHandle(5));
    assert!(ready(&mut material, &mesh, false, &mut device));

    material.freeze();
    assert!(material.is_frozen());
    device.pending_textures.push(TextureHandle(5));
    assert!(ready(&mut material, &mesh, false, &mut device));

    material.unfreeze();
    assert!(!ready(&mut material, &mesh, false, &mut device));
}

// ============================================================================
// BINDING
// ============================================================================

#[test]
fn test_bind_for_submesh_sets_uniforms() {
    let mut device = MockGraphicsDevice::new();
    let mut mesh = cube_mesh(&mut device);
    mesh.visibility = 0.5;
    let mut material = BasicMaterial::new("bound");
    material.diffuse_color = Vec3::new(1.0, 0.5, 0.25);
    material.diffuse_texture = Some(TextureHandle(2));
    assert!(ready(&mut material, &mesh, false, &mut device));
    let effect = material.effect().unwrap();

    let mut pass = PassState::new(1, DeviceCaps::default());
    pass.eye_position = Vec3::new(0.0, 0.0, 10.0);
    let world = Mat4::from_translation(Vec3::X);
    let sub_mesh = mesh.sub_meshes()[0].clone();
    device.clear_commands();
    material.bind_for_submesh(&world, &mesh, &sub_mesh, None, &pass, &mut device);

    assert_eq!(device.commands[0], DeviceCommand::EnableEffect(effect));
    assert!(device.commands.contains(&DeviceCommand::SetUniform {
        effect, name: "world".to_string(), value: UniformValue::Mat4(world),
    }));
    assert!(device.commands.contains(&DeviceCommand::SetUniform {
        effect, name: "vDiffuseColor".to_string(), value: UniformValue::Vec4(Vec4::new(1.0, 0.5, 0.25, 0.5)),
    }));
    assert!(device.commands.contains(&DeviceCommand::SetTexture {
        effect, sampler: "diffuseSampler".to_string(), texture: TextureHandle(2),
    }));

    device.clear_commands();
    material.bind_only_world_matrix(&Mat4::IDENTITY, &mut device);
    assert_eq!(device.commands, vec![DeviceCommand::SetUniform {
        effect, name: "world".to_string(), value: UniformValue::Mat4(Mat4::IDENTITY),
    }]);
}

#[test]
fn test_bind_without_effect_does_nothing() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    let mut material = BasicMaterial::new("unprepared");
    let sub_mesh = mesh.sub_meshes()[0].clone();
    device.clear_commands();
    material.bind_for_submesh(&Mat4::IDENTITY, &mesh, &sub_mesh, None, &PassState::new(1, DeviceCaps::default()), &mut device);
    assert!(device.commands.is_empty());
}

// ============================================================================
// SHADOW DEPTH & DISPOSE
// ============================================================================

#[test]
fn test_shadow_depth_effect_is_optional_and_cached() {
    let mut device = MockGraphicsDevice::new();
    let mut material = BasicMaterial::new("caster");
    let defines = vec!["#define FLOAT".to_string()];
    assert!(material.shadow_depth_effect(&defines, &mut device).is_none());

    material.shadow_depth_shader = Some("foliageDepth".to_string());
    let effect = material.shadow_depth_effect(&defines, &mut device).unwrap();
    assert_eq!(material.shadow_depth_effect(&defines, &mut device), Some(effect));
    assert_eq!(device.effect_desc(effect).unwrap().name, "foliageDepth");
    assert_eq!(device.created_effect_count(), 1);
}

#[test]
fn test_dispose_releases_every_effect() {
    let mut device = MockGraphicsDevice::new();
    let mesh = cube_mesh(&mut device);
    let mut material = BasicMaterial::new("disposed");
    material.shadow_depth_shader = Some("foliageDepth".to_string());
    ready(&mut material, &mesh, false, &mut device);
    ready(&mut material, &mesh, true, &mut device);
    material.shadow_depth_effect(&[], &mut device);

    device.clear_commands();
    material.dispose(&mut device);
    let released = device.commands.iter().filter(|c| matches!(c, DeviceCommand::ReleaseEffect(_))).count();
    assert_eq!(released, 3);
    assert!(material.effect().is_none());
    assert_eq!(material.variant_count(), 0);
}
