//! GPU 缓冲区布局
//!
//! 与计算着色器共享的结构体，全部 `#[repr(C)]` + Pod，每个 vec3 后显式补一个
//! 4 字节填充以满足 std140/std430 的 16 字节对齐。字段顺序与偏移是对外契约，
//! 修改时必须同步着色器。

use bytemuck::{Pod, Zeroable};

use super::bind_direction::BindDirection;
use super::collider::{Collider, ColliderShape, WorldCollider, WorldShape};
use super::integrator::BoneState;
use super::params::{ColliderGroupMask, GlobalParameters, JointParameters};

// ============================================================================
// 全局参数（96 字节）
// ============================================================================

/// 全局参数 uniform
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuGlobalParams {
    pub gravity: [f32; 3],
    pub _pad0: f32,

    pub dt_sub: f32,
    pub wind_amplitude: f32,
    pub wind_frequency: f32,
    pub wind_phase: f32,

    pub wind_direction: [f32; 3],
    pub _pad1: f32,

    pub substeps: u32,
    pub num_bones: u32,
    pub num_spheres: u32,
    pub num_capsules: u32,

    pub num_planes: u32,
    pub settling_frames: u32,
    pub _padding: [u32; 2],

    pub external_velocity: [f32; 3],
    pub _pad2: f32,
}

impl GpuGlobalParams {
    pub fn from_parameters(globals: &GlobalParameters, dt_sub: f32, counts: BufferCounts) -> Self {
        Self {
            gravity: globals.gravity.to_array(),
            dt_sub,
            wind_amplitude: globals.wind_amplitude,
            wind_frequency: globals.wind_frequency,
            wind_phase: globals.wind_phase,
            wind_direction: globals.wind_direction.to_array(),
            substeps: globals.substep_count(),
            num_bones: counts.num_bones,
            num_spheres: counts.num_spheres,
            num_capsules: counts.num_capsules,
            num_planes: counts.num_planes,
            settling_frames: globals.settling_frames,
            external_velocity: globals.external_velocity.to_array(),
            ..Zeroable::zeroed()
        }
    }
}

// ============================================================================
// 元素缓冲区
// ============================================================================

/// 骨骼状态（48 字节）
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuBone {
    pub current_position: [f32; 3],
    /// 扁平缓冲区中的父骨骼索引，根为 -1
    pub parent_index: i32,
    pub previous_position: [f32; 3],
    pub rest_length: f32,
    /// 父节点本地空间的静止方向
    pub rest_local_direction: [f32; 3],
    pub collider_group_mask: u32,
}

impl GpuBone {
    pub fn new(state: &BoneState, parent_index: i32, bind: &BindDirection, mask: ColliderGroupMask) -> Self {
        Self {
            current_position: state.current_position.to_array(),
            parent_index,
            previous_position: state.previous_position.to_array(),
            rest_length: bind.length,
            rest_local_direction: bind.local_direction.to_array(),
            collider_group_mask: mask.bits(),
        }
    }
}

/// 关节参数（32 字节）
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuJointParams {
    pub gravity_dir: [f32; 3],
    pub gravity_power: f32,
    pub stiffness: f32,
    pub drag_force: f32,
    pub hit_radius: f32,
    pub _pad: f32,
}

impl From<&JointParameters> for GpuJointParams {
    fn from(params: &JointParameters) -> Self {
        Self {
            gravity_dir: params.gravity_dir.to_array(),
            gravity_power: params.gravity_power,
            stiffness: params.stiffness,
            drag_force: params.drag_force,
            hit_radius: params.hit_radius,
            _pad: 0.0,
        }
    }
}

/// 球碰撞体（32 字节）
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub group_mask: u32,
    pub _pad: [u32; 3],
}

/// 胶囊碰撞体（32 字节）
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuCapsule {
    pub p0: [f32; 3],
    pub radius: f32,
    pub p1: [f32; 3],
    pub group_mask: u32,
}

/// 平面碰撞体（32 字节）
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPlane {
    pub point: [f32; 3],
    pub group_mask: u32,
    pub normal: [f32; 3],
    pub _pad: f32,
}

// ============================================================================
// 缓冲区集合
// ============================================================================

/// 各类元素数量
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferCounts {
    pub num_bones: u32,
    pub num_spheres: u32,
    pub num_capsules: u32,
    pub num_planes: u32,
}

impl BufferCounts {
    pub fn from_colliders(num_bones: usize, colliders: &[Collider]) -> Self {
        let mut counts = Self { num_bones: num_bones as u32, ..Default::default() };
        for collider in colliders {
            match collider.shape {
                ColliderShape::Sphere { .. } => counts.num_spheres += 1,
                ColliderShape::Capsule { .. } => counts.num_capsules += 1,
                ColliderShape::Plane { .. } => counts.num_planes += 1,
            }
        }
        counts
    }
}

/// 一个模型的全部 GPU 缓冲区（populate 时按数量分配容量）
#[derive(Clone, Debug, Default)]
pub struct SpringGpuBuffers {
    pub globals: GpuGlobalParams,
    pub bones: Vec<GpuBone>,
    pub joints: Vec<GpuJointParams>,
    pub spheres: Vec<GpuSphere>,
    pub capsules: Vec<GpuCapsule>,
    pub planes: Vec<GpuPlane>,
    counts: BufferCounts,
}

impl SpringGpuBuffers {
    pub fn with_counts(counts: BufferCounts) -> Self {
        Self {
            globals: GpuGlobalParams::default(),
            bones: Vec::with_capacity(counts.num_bones as usize),
            joints: Vec::with_capacity(counts.num_bones as usize),
            spheres: Vec::with_capacity(counts.num_spheres as usize),
            capsules: Vec::with_capacity(counts.num_capsules as usize),
            planes: Vec::with_capacity(counts.num_planes as usize),
            counts,
        }
    }

    #[inline]
    pub fn counts(&self) -> BufferCounts {
        self.counts
    }

    /// 按形状拆分世界碰撞体
    pub fn fill_colliders(&mut self, colliders: &[WorldCollider]) {
        self.spheres.clear();
        self.capsules.clear();
        self.planes.clear();
        for collider in colliders {
            let group_mask = collider.group_mask.bits();
            match collider.shape {
                WorldShape::Sphere { center, radius } => self.spheres.push(GpuSphere {
                    center: center.to_array(),
                    radius,
                    group_mask,
                    _pad: [0; 3],
                }),
                WorldShape::Capsule { p0, p1, radius } => self.capsules.push(GpuCapsule {
                    p0: p0.to_array(),
                    radius,
                    p1: p1.to_array(),
                    group_mask,
                }),
                WorldShape::Plane { point, normal } => self.planes.push(GpuPlane {
                    point: point.to_array(),
                    group_mask,
                    normal: normal.to_array(),
                    _pad: 0.0,
                }),
            }
        }
    }

    pub fn globals_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.globals)
    }

    pub fn bones_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bones)
    }

    pub fn joints_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.joints)
    }

    pub fn spheres_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    pub fn capsules_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.capsules)
    }

    pub fn planes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.planes)
    }
}
