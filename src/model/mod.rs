//! 运行时模型
//!
//! SpringSetup 描述一个模型加载后的 Spring Bone 配置（骨链、碰撞体、碰撞组），
//! SpringModel 把节点层次与 Spring Bone 系统串成每帧的更新流程。

mod runtime;

pub use runtime::SpringModel;

use crate::physics::{Collider, ColliderGroup, JointParameters};

/// 骨链中的一个关节
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointDesc {
    /// 场景节点索引
    pub node: usize,
    pub params: JointParameters,
}

/// 一条骨链的描述
///
/// joints[0] 是模拟根；joints[k] 的节点必须是 joints[k-1] 节点的直接子节点。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpringDesc {
    pub name: String,
    pub joints: Vec<JointDesc>,
    /// 引用的碰撞组索引（顺序即碰撞处理顺序）
    pub collider_groups: Vec<usize>,
}

impl SpringDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// 所有关节共用一组参数的骨链
    pub fn from_chain(name: impl Into<String>, nodes: &[usize], params: JointParameters) -> Self {
        Self {
            name: name.into(),
            joints: nodes.iter().map(|&node| JointDesc { node, params }).collect(),
            collider_groups: Vec::new(),
        }
    }

    pub fn with_joint(mut self, node: usize, params: JointParameters) -> Self {
        self.joints.push(JointDesc { node, params });
        self
    }

    pub fn with_collider_groups(mut self, groups: impl IntoIterator<Item = usize>) -> Self {
        self.collider_groups.extend(groups);
        self
    }
}

/// 模型的 Spring Bone 配置
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpringSetup {
    pub springs: Vec<SpringDesc>,
    pub colliders: Vec<Collider>,
    pub collider_groups: Vec<ColliderGroup>,
}

impl SpringSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加碰撞体，返回碰撞体索引
    pub fn add_collider(&mut self, collider: Collider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    /// 添加碰撞组，返回组索引
    pub fn add_collider_group(&mut self, name: impl Into<String>, colliders: Vec<usize>) -> usize {
        self.collider_groups.push(ColliderGroup::new(name, colliders));
        self.collider_groups.len() - 1
    }

    /// 添加骨链，返回骨链索引
    pub fn add_spring(&mut self, spring: SpringDesc) -> usize {
        self.springs.push(spring);
        self.springs.len() - 1
    }

    /// 全部关节数
    pub fn joint_count(&self) -> usize {
        self.springs.iter().map(|s| s.joints.len()).sum()
    }
}
