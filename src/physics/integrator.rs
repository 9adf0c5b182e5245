//! Verlet 积分器
//!
//! 每个子步：
//! 1. 速度 = 当前位置 - 上一位置
//! 2. 阻力衰减
//! 3. 外部惯性（角色移动的反向拖拽）
//! 4. 重力
//! 5. 风力（正弦）
//! 6. 刚度：把预测位置向静止目标混合
//! 7. 推进位置
//! 8. 长度约束：投影回以父位置为球心、静止长度为半径的球面

use glam::Vec3;

use super::params::{GlobalParameters, JointParameters};

/// 单根骨骼的 Verlet 状态（世界空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneState {
    pub current_position: Vec3,
    pub previous_position: Vec3,
}

impl BoneState {
    /// 静止于某点
    #[inline]
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            current_position: position,
            previous_position: position,
        }
    }

    /// 隐式速度（每子步位移）
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.current_position - self.previous_position
    }
}

/// 一个子步内对所有骨骼相同的外力
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubstepForces {
    /// 子步时长
    pub dt: f32,
    /// 世界重力
    pub gravity: Vec3,
    /// 风力（已乘振幅与相位正弦）
    pub wind: Vec3,
    /// 惯性加速度（-external_velocity * 惯性系数）
    pub inertia: Vec3,
}

impl SubstepForces {
    /// 按当前全局参数生成子步外力
    pub fn from_globals(globals: &GlobalParameters, dt: f32, inertia_strength: f32) -> Self {
        Self {
            dt,
            gravity: globals.gravity,
            wind: globals.wind_force(),
            inertia: -globals.external_velocity * inertia_strength,
        }
    }

    /// 无外力
    pub fn none(dt: f32) -> Self {
        Self {
            dt,
            gravity: Vec3::ZERO,
            wind: Vec3::ZERO,
            inertia: Vec3::ZERO,
        }
    }
}

/// 积分器
pub struct Integrator;

impl Integrator {
    /// 推进一个子步
    ///
    /// `rest_direction_world` 由父节点当前世界旋转得出，见 BindDirection。
    pub fn advance(
        state: &mut BoneState,
        params: &JointParameters,
        parent_position: Vec3,
        rest_direction_world: Vec3,
        rest_length: f32,
        forces: &SubstepForces,
    ) {
        let dt = forces.dt;

        let mut velocity = state.velocity();
        velocity *= 1.0 - params.drag_force;
        velocity += forces.inertia * dt;
        velocity += (params.gravity() + forces.gravity) * dt;
        velocity += forces.wind * dt;

        let target = parent_position + rest_direction_world * rest_length;
        let predicted = state.current_position + velocity;
        velocity += (target - predicted) * params.stiffness;

        let next = Self::constrain_length(
            state.current_position + velocity,
            parent_position,
            rest_length,
            rest_direction_world,
        );

        if next.is_finite() {
            state.previous_position = state.current_position;
            state.current_position = next;
        } else {
            // 极端参数下数值爆掉：回到静止目标，速度清零
            let rest = if target.is_finite() { target } else { parent_position };
            *state = BoneState::at_rest(rest);
        }
    }

    /// 刚性杆约束
    ///
    /// 位置与父位置重合时沿 `fallback_dir` 放置。
    #[inline]
    pub fn constrain_length(position: Vec3, parent_position: Vec3, rest_length: f32, fallback_dir: Vec3) -> Vec3 {
        let offset = position - parent_position;
        let dist = offset.length();
        let dir = if dist > 1e-6 && dist.is_finite() {
            offset / dist
        } else {
            fallback_dir.normalize_or(Vec3::Y)
        };
        parent_position + dir * rest_length
    }
}
