//! 场景图 / 骨骼系统 - 参考 nphysics Multibody 设计
//!
//! 核心设计思想：
//! - NodeLink: 单个场景节点（关节），类似 nphysics MultibodyLink
//! - NodeSet: 管理节点层次结构，负责 parent → child 世界变换传播
//! - SceneGraph: Spring Bone 系统与外部场景图之间的接口
//!
//! Spring Bone 只通过 SceneGraph 读写场景，宿主可以换成自己的骨骼实现。

mod node_link;
mod node_set;

pub use node_link::NodeLink;
pub use node_set::NodeSet;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 节点变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    /// 仅平移
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}

// ============================================================================
// 场景图接口
// ============================================================================

/// Spring Bone 对外部场景图的全部需求
///
/// - 读：父子关系、世界变换、动画姿态下的本地旋转
/// - 写：物理计算出的本地旋转（覆盖动画旋转，直到宿主清除）
pub trait SceneGraph {
    /// 节点数量
    fn node_count(&self) -> usize;

    /// 父节点索引
    fn parent_of(&self, node: usize) -> Option<usize>;

    /// 世界变换（local_to_world）
    fn world_transform(&self, node: usize) -> Mat4;

    /// 动画姿态下的本地旋转（不含物理覆盖）
    fn animated_local_rotation(&self, node: usize) -> Quat;

    /// 写入物理旋转
    fn apply_physics_rotation(&mut self, node: usize, rotation: Quat);

    /// 世界位置
    #[inline]
    fn world_position(&self, node: usize) -> Vec3 {
        self.world_transform(node).w_axis.truncate()
    }

    /// 世界旋转（去掉缩放）
    #[inline]
    fn world_rotation(&self, node: usize) -> Quat {
        let (_, rotation, _) = self.world_transform(node).to_scale_rotation_translation();
        rotation.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_transform_matrix_roundtrip() {
        let t = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.7),
            scale: Vec3::ONE,
        };
        let back = NodeTransform::from_matrix(t.to_matrix());
        assert!((back.translation - t.translation).length() < 1e-5);
        assert!(back.rotation.dot(t.rotation).abs() > 0.9999);
    }
}
