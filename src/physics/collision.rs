//! 碰撞解析 - 把骨骼位置推出被侵入的碰撞体
//!
//! 贪心、非迭代：按给定顺序依次处理每个碰撞体。多个碰撞体同时重叠时
//! 单帧不保证零穿透，只保证多帧后收敛。

use glam::Vec3;

use super::collider::{closest_point_on_segment, WorldCollider, WorldShape};
use super::params::ColliderGroupMask;

/// 位置恰好落在球心时的推出方向
const FALLBACK_PUSH_DIR: Vec3 = Vec3::Y;

/// 碰撞解析器
pub struct CollisionResolver;

impl CollisionResolver {
    /// 依次对每个碰撞体做推出，返回修正后的位置
    pub fn resolve<'a, I>(position: Vec3, hit_radius: f32, colliders: I) -> Vec3
    where
        I: IntoIterator<Item = &'a WorldCollider>,
    {
        colliders
            .into_iter()
            .fold(position, |pos, collider| Self::resolve_shape(pos, hit_radius, &collider.shape))
    }

    /// 按 Spring 的组列表与骨骼掩码过滤后解析
    ///
    /// 顺序：组的声明顺序，组内按碰撞体顺序。
    pub fn resolve_filtered(
        position: Vec3,
        hit_radius: f32,
        mask: ColliderGroupMask,
        spring_groups: &[usize],
        group_members: &[Vec<usize>],
        colliders: &[WorldCollider],
    ) -> Vec3 {
        if mask.is_empty() {
            return position;
        }
        let applicable = spring_groups
            .iter()
            .filter(|&&g| mask.allows(g))
            .filter_map(|&g| group_members.get(g))
            .flat_map(|members| members.iter())
            .filter_map(|&c| colliders.get(c));
        Self::resolve(position, hit_radius, applicable)
    }

    /// 单个形状的推出
    pub fn resolve_shape(pos: Vec3, hit_radius: f32, shape: &WorldShape) -> Vec3 {
        match *shape {
            WorldShape::Sphere { center, radius } => {
                Self::push_out_of_sphere(pos, center, radius + hit_radius, FALLBACK_PUSH_DIR)
            }
            WorldShape::Capsule { p0, p1, radius } => {
                let closest = closest_point_on_segment(pos, p0, p1);
                // 落在轴线上时沿垂直于轴的方向推出；退化胶囊与球一致
                let axis = p1 - p0;
                let fallback = if axis.length_squared() < 1e-12 {
                    FALLBACK_PUSH_DIR
                } else {
                    axis.normalize().any_orthonormal_vector()
                };
                Self::push_out_of_sphere(pos, closest, radius + hit_radius, fallback)
            }
            WorldShape::Plane { point, normal } => {
                let normal = normal.normalize_or(Vec3::Y);
                let signed = (pos - point).dot(normal);
                if signed < hit_radius {
                    pos + normal * (hit_radius - signed)
                } else {
                    pos
                }
            }
        }
    }

    #[inline]
    fn push_out_of_sphere(pos: Vec3, center: Vec3, min_dist: f32, fallback_dir: Vec3) -> Vec3 {
        let diff = pos - center;
        let dist_sq = diff.length_squared();
        if dist_sq >= min_dist * min_dist {
            return pos;
        }
        let dist = dist_sq.sqrt();
        let dir = if dist > 1e-12 { diff / dist } else { fallback_dir };
        center + dir * min_dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(center: Vec3, radius: f32, group: usize) -> WorldCollider {
        WorldCollider {
            shape: WorldShape::Sphere { center, radius },
            group_mask: ColliderGroupMask::group(group),
        }
    }

    #[test]
    fn test_sphere_push_to_surface() {
        let c = sphere(Vec3::ZERO, 0.1, 0);
        let out = CollisionResolver::resolve(Vec3::new(0.05, 0.0, 0.0), 0.02, [&c]);
        assert!((out - Vec3::new(0.12, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_sphere_outside_untouched() {
        let c = sphere(Vec3::ZERO, 0.1, 0);
        let pos = Vec3::new(0.2, 0.0, 0.0);
        assert_eq!(CollisionResolver::resolve(pos, 0.02, [&c]), pos);
    }

    #[test]
    fn test_sphere_center_no_nan() {
        let c = sphere(Vec3::ONE, 0.1, 0);
        let out = CollisionResolver::resolve(Vec3::ONE, 0.0, [&c]);
        assert!(out.is_finite());
        assert!((out.distance(Vec3::ONE) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_capsule_pushes_from_axis() {
        let shape = WorldShape::Capsule {
            p0: Vec3::new(0.0, -0.5, 0.0),
            p1: Vec3::new(0.0, 0.5, 0.0),
            radius: 0.1,
        };
        let out = CollisionResolver::resolve_shape(Vec3::new(0.05, 0.2, 0.0), 0.01, &shape);
        assert!((out - Vec3::new(0.11, 0.2, 0.0)).length() < 1e-6);

        // 端点外侧按球处理
        let out = CollisionResolver::resolve_shape(Vec3::new(0.0, 0.55, 0.0), 0.0, &shape);
        assert!((out - Vec3::new(0.0, 0.6, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_capsule_axis_point_pushed_sideways() {
        let shape = WorldShape::Capsule {
            p0: Vec3::new(1.0, 0.0, 0.0),
            p1: Vec3::new(1.0, 1.0, 0.0),
            radius: 0.1,
        };
        for y in [0.0_f32, 0.25, 0.5, 0.9, 1.0] {
            let pos = Vec3::new(1.0, y, 0.0);
            let out = CollisionResolver::resolve_shape(pos, 0.02, &shape);
            assert!(out.is_finite());
            assert!((shape.surface_distance(out) - 0.02).abs() < 1e-5, "y {} out {:?}", y, out);
            // 沿轴方向不移动
            assert!((out.y - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_capsule_matches_sphere() {
        let center = Vec3::new(0.3, -0.2, 0.1);
        let capsule = WorldShape::Capsule { p0: center, p1: center, radius: 0.15 };
        let ball = WorldShape::Sphere { center, radius: 0.15 };
        for pos in [
            Vec3::new(0.31, -0.2, 0.1),
            Vec3::new(0.3, -0.1, 0.15),
            center,
            Vec3::new(1.0, 1.0, 1.0),
        ] {
            assert_eq!(
                CollisionResolver::resolve_shape(pos, 0.03, &capsule),
                CollisionResolver::resolve_shape(pos, 0.03, &ball),
            );
        }
    }

    #[test]
    fn test_plane_push() {
        let shape = WorldShape::Plane { point: Vec3::ZERO, normal: Vec3::Y };
        let out = CollisionResolver::resolve_shape(Vec3::new(0.3, -0.2, 0.0), 0.05, &shape);
        assert!((out - Vec3::new(0.3, 0.05, 0.0)).length() < 1e-6);

        let above = Vec3::new(0.0, 0.5, 0.0);
        assert_eq!(CollisionResolver::resolve_shape(above, 0.05, &shape), above);
    }

    #[test]
    fn test_non_penetration_after_resolve() {
        let shapes = [
            WorldShape::Sphere { center: Vec3::new(0.0, 0.0, 0.0), radius: 0.2 },
            WorldShape::Capsule { p0: Vec3::new(1.0, 0.0, 0.0), p1: Vec3::new(1.0, 1.0, 0.0), radius: 0.1 },
            WorldShape::Plane { point: Vec3::new(0.0, -1.0, 0.0), normal: Vec3::Y },
        ];
        let hit = 0.03;
        for shape in &shapes {
            for i in 0..64 {
                let t = i as f32 * 0.37;
                let pos = Vec3::new(t.sin() * 0.3, t.cos() * 0.9, (t * 1.7).sin() * 0.2)
                    + match shape {
                        WorldShape::Capsule { .. } => Vec3::X,
                        WorldShape::Plane { .. } => Vec3::NEG_Y,
                        _ => Vec3::ZERO,
                    };
                let out = CollisionResolver::resolve_shape(pos, hit, shape);
                assert!(out.is_finite());
                assert!(shape.surface_distance(out) >= hit - 1e-5, "shape {:?} pos {:?}", shape, pos);
            }
        }
    }

    #[test]
    fn test_filtered_respects_mask() {
        let colliders = vec![sphere(Vec3::new(5.0, 0.0, 0.0), 0.1, 0), sphere(Vec3::ZERO, 0.5, 1)];
        let groups = vec![vec![0], vec![1]];
        let pos = Vec3::new(0.1, 0.0, 0.0);

        let only_group0 = ColliderGroupMask::from_bits_retain(0x1);
        let out = CollisionResolver::resolve_filtered(pos, 0.0, only_group0, &[0, 1], &groups, &colliders);
        assert_eq!(out, pos);

        let out = CollisionResolver::resolve_filtered(pos, 0.0, ColliderGroupMask::ALL, &[0, 1], &groups, &colliders);
        assert!((out.length() - 0.5).abs() < 1e-6);

        // Spring 没有引用组 1 时，全 1 掩码也不生效
        let out = CollisionResolver::resolve_filtered(pos, 0.0, ColliderGroupMask::ALL, &[0], &groups, &colliders);
        assert_eq!(out, pos);

        let out = CollisionResolver::resolve_filtered(pos, 0.0, ColliderGroupMask::empty(), &[0, 1], &groups, &colliders);
        assert_eq!(out, pos);
    }
}
