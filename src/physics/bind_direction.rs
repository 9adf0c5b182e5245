//! 绑定方向 - 静止姿态下父 → 子的方向
//!
//! 方向在 populate 时以**父节点本地坐标**保存，每帧用父节点当前的世界旋转
//! 重新作用一次得到世界方向。
//! - 只存世界方向且不再更新：角色转身后刚度目标仍指向原方向（"静止北"）
//! - 对已经是世界方向的向量每帧再乘一次旋转：方向被重复旋转（"双重旋转"）

use glam::{Quat, Vec3};

/// 单根骨骼的绑定方向与长度
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BindDirection {
    /// 父节点本地空间下指向本骨骼的单位方向
    pub local_direction: Vec3,
    /// 静止长度
    pub length: f32,
}

impl Default for BindDirection {
    fn default() -> Self {
        Self {
            local_direction: Vec3::Y,
            length: 0.0,
        }
    }
}

impl BindDirection {
    /// 从绑定姿态采集
    ///
    /// 父子重合时长度记为 0，方向退回父节点本地 +Y。
    pub fn capture(parent_world_rotation: Quat, parent_position: Vec3, position: Vec3) -> Self {
        let offset = position - parent_position;
        let length = offset.length();
        if !(length > 1e-6) || !length.is_finite() {
            return Self::default();
        }
        let local = parent_world_rotation.normalize().inverse() * (offset / length);
        Self {
            local_direction: local.normalize_or(Vec3::Y),
            length,
        }
    }

    /// 当前世界空间的静止方向
    #[inline]
    pub fn world_direction(&self, parent_world_rotation: Quat) -> Vec3 {
        (parent_world_rotation * self.local_direction).normalize_or(Vec3::Y)
    }

    /// 当前世界空间的静止位置（刚度目标）
    #[inline]
    pub fn rest_target(&self, parent_world_rotation: Quat, parent_position: Vec3) -> Vec3 {
        parent_position + self.world_direction(parent_world_rotation) * self.length
    }
}

/// 一条骨链的绑定方向表，按骨骼索引存放（根骨骼为默认值）
#[derive(Clone, Debug, Default)]
pub struct BindDirectionTracker {
    entries: Vec<BindDirection>,
}

impl BindDirectionTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// 追加一根骨骼；根骨骼传 None
    pub fn push(&mut self, bind: Option<BindDirection>) {
        self.entries.push(bind.unwrap_or_default());
    }

    #[inline]
    pub fn get(&self, bone: usize) -> Option<&BindDirection> {
        self.entries.get(bone)
    }

    /// 静止长度
    #[inline]
    pub fn rest_length(&self, bone: usize) -> f32 {
        self.entries.get(bone).map_or(0.0, |b| b.length)
    }

    /// 当前世界静止方向
    #[inline]
    pub fn rest_direction_world(&self, bone: usize, parent_world_rotation: Quat) -> Vec3 {
        self.entries
            .get(bone)
            .map_or(Vec3::Y, |b| b.world_direction(parent_world_rotation))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, TAU};

    fn angle_between(a: Vec3, b: Vec3) -> f32 {
        a.normalize().dot(b.normalize()).clamp(-1.0, 1.0).acos()
    }

    #[test]
    fn test_capture_is_parent_local() {
        let parent_rot = Quat::from_rotation_z(FRAC_PI_2);
        let bind = BindDirection::capture(parent_rot, Vec3::ZERO, Vec3::new(0.0, 0.2, 0.0));
        assert!((bind.length - 0.2).abs() < 1e-6);
        // 世界 +Y 在绕 Z 转了 90° 的父节点下是本地 +X
        assert!((bind.local_direction - Vec3::X).length() < 1e-5);
        assert!((bind.world_direction(parent_rot) - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_perpendicular_rotation_changes_direction() {
        let bind = BindDirection::capture(Quat::IDENTITY, Vec3::ZERO, Vec3::new(0.0, -0.1, 0.0));
        let rest = bind.world_direction(Quat::IDENTITY);

        let turned = bind.world_direction(Quat::from_rotation_x(FRAC_PI_2));
        assert!((angle_between(rest, turned) - FRAC_PI_2).abs() < 1e-4);

        let full_turn = bind.world_direction(Quat::from_rotation_x(TAU));
        assert!(angle_between(rest, full_turn) < 1e-3);
    }

    #[test]
    fn test_parallel_rotation_keeps_direction() {
        let bind = BindDirection::capture(Quat::IDENTITY, Vec3::ZERO, Vec3::new(0.0, -0.1, 0.0));
        let rest = bind.world_direction(Quat::IDENTITY);
        for angle in [0.3_f32, 1.0, 2.5, -1.2] {
            let turned = bind.world_direction(Quat::from_rotation_y(angle));
            assert!((turned - rest).length() < 1e-5);
        }
    }

    #[test]
    fn test_no_double_rotation() {
        // 连续多帧查询同一父旋转，结果不累积
        let bind = BindDirection::capture(Quat::IDENTITY, Vec3::ZERO, Vec3::X);
        let parent = Quat::from_rotation_z(0.4);
        let first = bind.world_direction(parent);
        for _ in 0..10 {
            assert!((bind.world_direction(parent) - first).length() < 1e-6);
        }
    }

    #[test]
    fn test_zero_length_fallback() {
        let bind = BindDirection::capture(Quat::from_rotation_x(1.0), Vec3::ONE, Vec3::ONE);
        assert_eq!(bind.length, 0.0);
        assert_eq!(bind.local_direction, Vec3::Y);
        let target = bind.rest_target(Quat::IDENTITY, Vec3::ONE);
        assert_eq!(target, Vec3::ONE);
    }

    #[test]
    fn test_tracker_lookup() {
        let mut tracker = BindDirectionTracker::with_capacity(2);
        tracker.push(None);
        tracker.push(Some(BindDirection::capture(Quat::IDENTITY, Vec3::ZERO, Vec3::new(0.0, 0.0, 0.3))));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.rest_length(0), 0.0);
        assert!((tracker.rest_length(1) - 0.3).abs() < 1e-6);
        let dir = tracker.rest_direction_world(1, Quat::from_rotation_y(FRAC_PI_2));
        assert!((dir - Vec3::X).length() < 1e-5);
    }
}
