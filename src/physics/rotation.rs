//! 旋转重建 - 由模拟方向推导关节旋转
//!
//! 使用半角（Rodrigues）形式：q = normalize(cross(from, to), dot(from, to) + 1)。
//! 不走 acos(dot)：dot → 1 时 acos 精度崩溃，微小噪声就会给出轴向乱跳的大旋转。

use glam::{Quat, Vec3};

/// 默认反向判定阈值
pub const ANTIPARALLEL_EPSILON: f32 = 1e-6;

/// 把 `from` 转到 `to` 的最小旋转
///
/// - from == to → 单位旋转
/// - from == -to → 绕某个与 from 正交的轴转 180°
/// - 零向量输入 → 单位旋转
#[inline]
pub fn derive_local_rotation(from: Vec3, to: Vec3) -> Quat {
    derive_local_rotation_eps(from, to, ANTIPARALLEL_EPSILON)
}

/// 同上，可指定反向判定阈值
pub fn derive_local_rotation_eps(from: Vec3, to: Vec3, epsilon: f32) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let r = from.dot(to) + 1.0;
    let q = if r < epsilon {
        // 近似反向：任取正交轴，转 180°
        let axis = from.any_orthonormal_vector();
        Quat::from_xyzw(axis.x, axis.y, axis.z, 0.0)
    } else {
        let c = from.cross(to);
        Quat::from_xyzw(c.x, c.y, c.z, r)
    };

    let q = q.normalize();
    if q.is_finite() {
        q
    } else {
        Quat::IDENTITY
    }
}

/// 把方向差在死区内的情况当作无旋转
#[inline]
pub fn derive_with_deadzone(from: Vec3, to: Vec3, deadzone: f32, epsilon: f32) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from.distance_squared(to) < deadzone * deadzone {
        Quat::IDENTITY
    } else {
        derive_local_rotation_eps(from, to, epsilon)
    }
}
