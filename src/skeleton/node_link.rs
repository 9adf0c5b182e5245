//! 场景节点 - 参考 nphysics MultibodyLink 设计
//!
//! NodeLink 是场景图的基本单元，每个 NodeLink 代表层次中的一个关节。
//! 旋转分两层：动画层（rest * animation）与物理层（Spring Bone 写回的覆盖值）。

use glam::{Mat4, Quat, Vec3};

use super::NodeTransform;

/// 场景节点 - 类似 nphysics MultibodyLink
///
/// 设计原则：
/// - 静态数据：节点名称、父子关系、绑定姿态
/// - 动态数据：每帧更新的动画层、物理层与变换缓存
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct NodeLink {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 节点名称
    pub name: String,

    /// 节点内部索引
    pub(crate) internal_id: usize,

    /// 父节点索引 (-1 表示根节点)
    pub parent_index: i32,

    /// 绑定姿态（相对父节点）
    pub rest: NodeTransform,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 动画平移
    pub animation_translate: Vec3,

    /// 动画旋转
    pub animation_rotate: Quat,

    /// 物理旋转（Spring Bone 写回，存在时替代 rest * animation）
    pub physics_rotate: Option<Quat>,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,
}

impl NodeLink {
    /// 创建新节点
    pub fn new(name: impl Into<String>, rest: NodeTransform) -> Self {
        Self {
            name: name.into(),
            internal_id: 0,
            parent_index: -1,
            rest,
            animation_translate: Vec3::ZERO,
            animation_rotate: Quat::IDENTITY,
            physics_rotate: None,
            local_to_parent: rest.to_matrix(),
            local_to_world: rest.to_matrix(),
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 节点索引
    #[inline]
    pub fn link_id(&self) -> usize {
        self.internal_id
    }

    /// 父节点索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根节点
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.col(3).truncate()
    }

    /// 获取世界旋转
    #[inline]
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation.normalize()
    }

    /// 动画姿态下的本地旋转
    #[inline]
    pub fn animated_rotation(&self) -> Quat {
        (self.rest.rotation * self.animation_rotate).normalize()
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 重置动画状态
    #[inline]
    pub fn reset_animation(&mut self) {
        self.animation_translate = Vec3::ZERO;
        self.animation_rotate = Quat::IDENTITY;
    }

    /// 清除物理覆盖
    #[inline]
    pub fn reset_physics(&mut self) {
        self.physics_rotate = None;
    }

    /// 计算本地变换 (local_to_parent)
    ///
    /// 1. 平移 = rest.translation + animation_translate
    /// 2. 旋转 = physics_rotate，否则 rest.rotation * animation_rotate
    pub fn compute_local_transform(&mut self) {
        let translate = self.rest.translation + self.animation_translate;
        let rotation = self.physics_rotate.unwrap_or_else(|| self.animated_rotation());
        self.local_to_parent =
            Mat4::from_scale_rotation_translation(self.rest.scale, rotation, translate);
    }
}

impl Default for NodeLink {
    fn default() -> Self {
        Self::new(String::new(), NodeTransform::default())
    }
}
