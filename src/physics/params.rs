//! 关节参数与全局参数

use std::f32::consts::TAU;

use bitflags::bitflags;
use glam::Vec3;

// ============================================================================
// 碰撞组掩码
// ============================================================================

bitflags! {
    /// 碰撞组掩码：第 i 位置位 ⇔ 可与第 i 个 ColliderGroup 碰撞
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColliderGroupMask: u32 {
        /// 与所有被引用的组碰撞
        const ALL = !0;
    }
}

impl ColliderGroupMask {
    /// 单个组对应的位（超出 32 位时为空）
    #[inline]
    pub fn group(index: usize) -> Self {
        if index < 32 {
            Self::from_bits_retain(1 << index)
        } else {
            Self::empty()
        }
    }

    /// 是否允许与第 `index` 个组碰撞
    ///
    /// 32 以后的组没有对应位，只有全 1 掩码才放行。
    #[inline]
    pub fn allows(self, index: usize) -> bool {
        if index < 32 {
            self.bits() & (1 << index) != 0
        } else {
            self.is_all()
        }
    }
}

impl Default for ColliderGroupMask {
    fn default() -> Self {
        Self::ALL
    }
}

// ============================================================================
// 关节参数
// ============================================================================

/// 每个关节的可调参数
///
/// 不做范围校验：负半径、超出 [0,1] 的刚度等都原样接受。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointParameters {
    /// 刚度 [0,1]，每个子步把预测位置向静止位置拉回的比例
    pub stiffness: f32,
    /// 阻力 [0,1]，速度衰减比例
    pub drag_force: f32,
    /// 碰撞半径
    pub hit_radius: f32,
    /// 重力强度
    pub gravity_power: f32,
    /// 重力方向（单位向量）
    pub gravity_dir: Vec3,
    /// 碰撞组掩码
    pub collider_group_mask: ColliderGroupMask,
}

impl Default for JointParameters {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            drag_force: 0.4,
            hit_radius: 0.02,
            gravity_power: 0.0,
            gravity_dir: Vec3::NEG_Y,
            collider_group_mask: ColliderGroupMask::ALL,
        }
    }
}

impl JointParameters {
    /// 关节自身的重力加速度
    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity_dir * self.gravity_power
    }
}

// ============================================================================
// 全局参数
// ============================================================================

/// 每个模型一份的全局模拟参数
///
/// 加载时设置一次；external_velocity 由宿主持续更新。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalParameters {
    /// 世界重力（与关节重力叠加），默认零，关节自身的 gravity_power 为主要来源
    pub gravity: Vec3,
    /// 风力振幅
    pub wind_amplitude: f32,
    /// 风力频率（Hz）
    pub wind_frequency: f32,
    /// 风力相位（弧度，随模拟时间推进）
    pub wind_phase: f32,
    /// 风向
    pub wind_direction: Vec3,
    /// 每帧子步数（至少 1）
    pub substeps: u32,
    /// 预热帧数
    pub settling_frames: u32,
    /// 外部速度（角色移动速度，用于惯性拖拽）
    pub external_velocity: Vec3,
}

impl Default for GlobalParameters {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            wind_amplitude: 0.0,
            wind_frequency: 0.0,
            wind_phase: 0.0,
            wind_direction: Vec3::X,
            substeps: 1,
            settling_frames: 0,
            external_velocity: Vec3::ZERO,
        }
    }
}

impl GlobalParameters {
    /// 实际子步数
    #[inline]
    pub fn substep_count(&self) -> u32 {
        self.substeps.max(1)
    }

    /// 当前相位下的风力
    #[inline]
    pub fn wind_force(&self) -> Vec3 {
        self.wind_direction.normalize_or_zero() * self.wind_amplitude * self.wind_phase.sin()
    }

    /// 推进风力相位，保持在 [0, 2π)
    pub fn advance_wind(&mut self, dt: f32) {
        let phase = self.wind_phase + TAU * self.wind_frequency * dt;
        self.wind_phase = if phase.is_finite() { phase.rem_euclid(TAU) } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        let mask = ColliderGroupMask::from_bits_retain(0x1);
        assert!(mask.allows(0));
        assert!(!mask.allows(1));
        assert!(!mask.allows(40));
        assert!(ColliderGroupMask::ALL.allows(40));
        assert!(!ColliderGroupMask::empty().allows(0));
        assert_eq!(ColliderGroupMask::group(3).bits(), 0b1000);
        assert!(ColliderGroupMask::group(32).is_empty());
    }

    #[test]
    fn test_wind_phase_wraps() {
        let mut globals = GlobalParameters {
            wind_amplitude: 2.0,
            wind_frequency: 1.0,
            ..Default::default()
        };
        globals.advance_wind(0.25);
        assert!((globals.wind_phase - TAU * 0.25).abs() < 1e-5);
        assert!((globals.wind_force() - Vec3::X * 2.0).length() < 1e-4);

        globals.advance_wind(1.0);
        assert!(globals.wind_phase >= 0.0 && globals.wind_phase < TAU);
        assert!((globals.wind_phase - TAU * 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_substeps_at_least_one() {
        let globals = GlobalParameters { substeps: 0, ..Default::default() };
        assert_eq!(globals.substep_count(), 1);
    }
}
