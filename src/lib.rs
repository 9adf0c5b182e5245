//! Spring Bone 运行时引擎
//!
//! 为人形骨骼上的头发、衣物、饰品提供二次运动（Spring Bone 物理）。
//!
//! 模块划分：
//! - skeleton: 场景图 / 骨骼层次（外部协作者的最小实现）
//! - physics: Spring Bone 模拟核心（积分、碰撞、旋转重建、GPU 布局）
//! - model: 运行时模型，把骨骼与 Spring Bone 系统串起来

pub mod model;
pub mod physics;
pub mod skeleton;

use thiserror::Error;

pub use model::{SpringModel, SpringSetup, SpringDesc, JointDesc};
pub use physics::{
    get_config, reset_config, set_config, SpringBoneSystem, SpringConfig,
    GlobalParameters, JointParameters, ColliderGroupMask,
};
pub use skeleton::{NodeSet, NodeLink, NodeTransform, SceneGraph};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Spring Bone 配置错误
///
/// 只在 populate 阶段产生；模拟阶段的数值退化全部就地兜底，不会上抛。
#[derive(Debug, Error)]
pub enum SpringError {
    #[error("unknown scene node {node}")]
    UnknownNode { node: usize },

    #[error("spring {spring} references unknown collider group {group}")]
    UnknownColliderGroup { spring: usize, group: usize },

    #[error("collider group {group} references unknown collider {collider}")]
    UnknownCollider { group: usize, collider: usize },

    #[error("spring {spring} joint {joint}: node {node} is not a child of node {expected_parent}")]
    UnknownParent {
        spring: usize,
        joint: usize,
        node: usize,
        expected_parent: usize,
    },

    #[error("spring {spring} has no joints")]
    EmptySpring { spring: usize },
}

pub type Result<T> = std::result::Result<T, SpringError>;
