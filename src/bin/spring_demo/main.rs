//! Spring Bone 演示（无窗口）
//!
//! 三节竖直骨链：预热 150 帧后把根节点在 10 帧内抬高 0.3m，
//! 再观察 120 帧回落，逐帧打印尖端位置。
//!
//! 运行：RUST_LOG=info cargo run --features demo --bin spring_demo

use glam::Vec3;

use spring_bone_engine::physics::{Collider, ColliderGroupMask};
use spring_bone_engine::{
    GlobalParameters, JointParameters, NodeSet, NodeTransform, SceneGraph, SpringDesc, SpringModel,
    SpringSetup,
};

const DT: f32 = 1.0 / 60.0;

fn build_model() -> spring_bone_engine::Result<SpringModel> {
    let mut skeleton = NodeSet::new();
    let body = skeleton.add_node("body", None, NodeTransform::default())?;
    let root = skeleton.add_node("hair_root", Some(body), NodeTransform::from_translation(Vec3::new(0.0, 1.5, 0.0)))?;
    let mid = skeleton.add_node("hair_mid", Some(root), NodeTransform::from_translation(Vec3::new(0.0, -0.1, 0.0)))?;
    let tip = skeleton.add_node("hair_tip", Some(mid), NodeTransform::from_translation(Vec3::new(0.0, -0.1, 0.0)))?;

    let mut setup = SpringSetup::new();
    let shoulder = setup.add_collider(Collider::capsule(body, Vec3::new(-0.2, 1.25, 0.1), Vec3::new(0.2, 1.25, 0.1), 0.05));
    let group = setup.add_collider_group("body", vec![shoulder]);
    let params = JointParameters {
        stiffness: 0.5,
        drag_force: 0.3,
        hit_radius: 0.02,
        collider_group_mask: ColliderGroupMask::group(group),
        ..Default::default()
    };
    setup.add_spring(SpringDesc::from_chain("hair", &[root, mid, tip], params).with_collider_groups([group]));

    let globals = GlobalParameters {
        gravity: Vec3::new(0.0, -9.8, 0.0),
        substeps: 2,
        settling_frames: 150,
        ..Default::default()
    };
    Ok(SpringModel::new("demo", skeleton, setup, globals))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("spring_bone_engine v{}", spring_bone_engine::VERSION);

    let mut model = match build_model() {
        Ok(model) => model,
        Err(e) => {
            log::error!("构建演示场景失败: {}", e);
            return;
        }
    };
    if !model.build_spring_bones() {
        return;
    }

    let root = model.skeleton.find_node_by_name("hair_root").unwrap_or(1);
    let tip = model.skeleton.find_node_by_name("hair_tip").unwrap_or(3);

    model.settle(DT);
    let rest_offset = model.skeleton.world_position(tip) - model.skeleton.world_position(root);
    log::info!("预热完成, 尖端相对根偏移 {:?}", rest_offset);

    for frame in 1..=10 {
        model.skeleton.set_animation_translate(root, Vec3::new(0.0, 0.03 * frame as f32, 0.0));
        model.update(DT);
        log::info!(
            "抬升 {:2}: 根 y={:.4}, 尖端 y={:.4}",
            frame,
            model.skeleton.world_position(root).y,
            model.skeleton.world_position(tip).y
        );
    }

    for frame in 1..=120 {
        model.update(DT);
        if frame % 20 == 0 {
            let offset = model.skeleton.world_position(tip) - model.skeleton.world_position(root);
            log::info!("回落 {:3}: 偏移误差 {:.4}m", frame, (offset - rest_offset).length());
        }
    }

    if let Some(system) = model.spring_bones.as_ref() {
        log::info!(
            "结束: 长度误差 {:.2e}, 最大穿透 {:.2e}",
            system.max_length_error(),
            system.max_penetration()
        );
    }
}
