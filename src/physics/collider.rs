//! 碰撞体定义与世界空间几何
//!
//! Collider 挂在场景节点上，用本地偏移描述形状；每帧根据节点世界变换
//! 重新计算 WorldCollider。ColliderGroup 是碰撞体索引的具名集合，
//! Spring 通过组索引（而不是碰撞体索引）引用它们。

use glam::{Mat4, Vec3};

use super::params::ColliderGroupMask;

/// 碰撞体形状（节点本地空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShape {
    /// 球
    Sphere { offset: Vec3, radius: f32 },
    /// 胶囊：offset → tail 线段加半径
    Capsule { offset: Vec3, tail: Vec3, radius: f32 },
    /// 平面：过 offset 点，法线 normal
    Plane { offset: Vec3, normal: Vec3 },
}

/// 碰撞体
#[derive(Clone, Debug, PartialEq)]
pub struct Collider {
    /// 所属场景节点
    pub node: usize,
    /// 形状
    pub shape: ColliderShape,
}

impl Collider {
    pub fn sphere(node: usize, offset: Vec3, radius: f32) -> Self {
        Self { node, shape: ColliderShape::Sphere { offset, radius } }
    }

    pub fn capsule(node: usize, offset: Vec3, tail: Vec3, radius: f32) -> Self {
        Self { node, shape: ColliderShape::Capsule { offset, tail, radius } }
    }

    pub fn plane(node: usize, offset: Vec3, normal: Vec3) -> Self {
        Self { node, shape: ColliderShape::Plane { offset, normal } }
    }

    /// 根据节点世界变换计算世界空间几何
    ///
    /// 点用 pos + rot * offset，半径不随缩放变化。
    pub fn to_world(&self, node_world: Mat4) -> WorldShape {
        let (_, rotation, position) = node_world.to_scale_rotation_translation();
        let rotation = rotation.normalize();
        let point = |local: Vec3| position + rotation * local;
        match self.shape {
            ColliderShape::Sphere { offset, radius } => WorldShape::Sphere {
                center: point(offset),
                radius,
            },
            ColliderShape::Capsule { offset, tail, radius } => WorldShape::Capsule {
                p0: point(offset),
                p1: point(tail),
                radius,
            },
            ColliderShape::Plane { offset, normal } => WorldShape::Plane {
                point: point(offset),
                normal: (rotation * normal).normalize_or(Vec3::Y),
            },
        }
    }
}

/// 碰撞组
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColliderGroup {
    pub name: String,
    /// 碰撞体索引
    pub colliders: Vec<usize>,
}

impl ColliderGroup {
    pub fn new(name: impl Into<String>, colliders: Vec<usize>) -> Self {
        Self { name: name.into(), colliders }
    }
}

/// 世界空间形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldShape {
    Sphere { center: Vec3, radius: f32 },
    Capsule { p0: Vec3, p1: Vec3, radius: f32 },
    Plane { point: Vec3, normal: Vec3 },
}

/// 世界空间碰撞体快照（每帧只读）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldCollider {
    pub shape: WorldShape,
    /// 列出该碰撞体的组构成的掩码
    pub group_mask: ColliderGroupMask,
}

impl WorldShape {
    /// 点到表面的有符号距离（内部为负）
    pub fn surface_distance(&self, pos: Vec3) -> f32 {
        match *self {
            WorldShape::Sphere { center, radius } => pos.distance(center) - radius,
            WorldShape::Capsule { p0, p1, radius } => {
                pos.distance(closest_point_on_segment(pos, p0, p1)) - radius
            }
            WorldShape::Plane { point, normal } => (pos - point).dot(normal),
        }
    }
}

/// 线段上距 pos 最近的点；退化线段返回 p0
#[inline]
pub fn closest_point_on_segment(pos: Vec3, p0: Vec3, p1: Vec3) -> Vec3 {
    let seg = p1 - p0;
    let len_sq = seg.length_squared();
    if len_sq < 1e-12 {
        return p0;
    }
    let t = ((pos - p0).dot(seg) / len_sq).clamp(0.0, 1.0);
    p0 + seg * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_world_geometry_follows_node() {
        let collider = Collider::capsule(0, Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.0, 0.3, 0.0), 0.05);
        let world = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 0.0, 0.0),
        );
        match collider.to_world(world) {
            WorldShape::Capsule { p0, p1, radius } => {
                assert!((p0 - Vec3::new(0.9, 0.0, 0.0)).length() < 1e-5);
                assert!((p1 - Vec3::new(0.7, 0.0, 0.0)).length() < 1e-5);
                assert_eq!(radius, 0.05);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_plane_normal_rotates() {
        let collider = Collider::plane(0, Vec3::ZERO, Vec3::Y);
        let world = Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2);
        match collider.to_world(world) {
            WorldShape::Plane { normal, .. } => assert!((normal - Vec3::Z).length() < 1e-5),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_closest_point_clamps() {
        let p0 = Vec3::ZERO;
        let p1 = Vec3::X;
        assert_eq!(closest_point_on_segment(Vec3::new(-1.0, 1.0, 0.0), p0, p1), p0);
        assert_eq!(closest_point_on_segment(Vec3::new(2.0, 1.0, 0.0), p0, p1), p1);
        assert!((closest_point_on_segment(Vec3::new(0.5, 1.0, 0.0), p0, p1) - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(closest_point_on_segment(Vec3::ONE, p0, p0), p0);
    }
}
