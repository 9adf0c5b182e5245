//! Spring Bone 物理模块
//!
//! 位置型 Verlet 积分 + 刚性长度约束 + 球/胶囊/平面碰撞，
//! 模拟结果通过半角四元数重建为关节本地旋转写回骨骼。

mod bind_direction;
mod collider;
mod collision;
pub mod config;
mod gpu_layout;
mod integrator;
mod params;
mod rotation;
mod spring_physics;


pub use bind_direction::{BindDirection, BindDirectionTracker};
pub use collider::{closest_point_on_segment, Collider, ColliderGroup, ColliderShape, WorldCollider, WorldShape};
pub use collision::CollisionResolver;
pub use config::{get_config, reset_config, set_config, SpringConfig};
pub use gpu_layout::{
    BufferCounts, GpuBone, GpuCapsule, GpuGlobalParams, GpuJointParams, GpuPlane, GpuSphere,
    SpringGpuBuffers,
};
pub use integrator::{BoneState, Integrator, SubstepForces};
pub use params::{ColliderGroupMask, GlobalParameters, JointParameters};
pub use rotation::{derive_local_rotation, derive_local_rotation_eps, derive_with_deadzone, ANTIPARALLEL_EPSILON};
pub use spring_physics::{Bone, Spring, SpringBoneSystem};
