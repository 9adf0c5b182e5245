//! 节点集合 - 类似 nphysics Multibody，管理场景节点层次
//!
//! 节点只能挂在已存在的父节点下，因此层次天然无环；
//! 变换顺序按广度优先预先计算，父节点总是先于子节点更新。

use std::collections::HashMap;
use std::collections::VecDeque;

use glam::{Mat4, Quat, Vec3};

use crate::{Result, SpringError};

use super::{NodeLink, NodeTransform, SceneGraph};

/// 节点集合
#[derive(Clone, Debug, Default)]
pub struct NodeSet {
    nodes: Vec<NodeLink>,
    name_to_index: HashMap<String, usize>,
    /// 子节点缓存（索引 → 子节点列表）
    children_cache: Vec<Vec<usize>>,
    /// 变换更新顺序（父先于子）
    transform_order: Vec<usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，返回节点索引
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        rest: NodeTransform,
    ) -> Result<usize> {
        if let Some(p) = parent {
            if p >= self.nodes.len() {
                return Err(SpringError::UnknownNode { node: p });
            }
        }

        let index = self.nodes.len();
        let mut link = NodeLink::new(name, rest);
        link.internal_id = index;
        link.parent_index = parent.map_or(-1, |p| p as i32);

        self.name_to_index.insert(link.name.clone(), index);
        self.nodes.push(link);
        self.children_cache.push(Vec::new());
        if let Some(p) = parent {
            self.children_cache[p].push(index);
        }
        self.rebuild_transform_order();
        self.update_world_transform_recursive(index);
        Ok(index)
    }

    /// 按广度优先重新计算变换顺序
    fn rebuild_transform_order(&mut self) {
        self.transform_order.clear();
        let mut queue: VecDeque<usize> = self
            .nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.internal_id)
            .collect();
        while let Some(idx) = queue.pop_front() {
            self.transform_order.push(idx);
            queue.extend(self.children_cache[idx].iter().copied());
        }
    }

    // ========================================
    // 查询
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, idx: usize) -> Option<&NodeLink> {
        self.nodes.get(idx)
    }

    #[inline]
    pub fn node_mut(&mut self, idx: usize) -> Option<&mut NodeLink> {
        self.nodes.get_mut(idx)
    }

    /// 通过名称查找节点
    pub fn find_node_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    #[inline]
    pub fn children(&self, idx: usize) -> &[usize] {
        self.children_cache.get(idx).map_or(&[], |c| c.as_slice())
    }

    // ========================================
    // 姿态编辑
    // ========================================

    /// 设置动画平移（不立即刷新世界变换）
    pub fn set_animation_translate(&mut self, idx: usize, translate: Vec3) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.animation_translate = translate;
        }
    }

    /// 设置动画旋转（不立即刷新世界变换）
    pub fn set_animation_rotate(&mut self, idx: usize, rotate: Quat) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.animation_rotate = rotate;
        }
    }

    /// 清除全部物理覆盖
    pub fn clear_physics_rotations(&mut self) {
        for node in &mut self.nodes {
            node.reset_physics();
        }
    }

    /// 重置全部动画
    pub fn reset_animation(&mut self) {
        for node in &mut self.nodes {
            node.reset_animation();
        }
    }

    // ========================================
    // 变换传播
    // ========================================

    /// 按变换顺序更新全部世界变换
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.transform_order.len() {
            let idx = self.transform_order[i];
            self.nodes[idx].compute_local_transform();
            let parent_world = match self.nodes[idx].parent_id() {
                Some(p) => self.nodes[p].local_to_world,
                None => Mat4::IDENTITY,
            };
            self.nodes[idx].local_to_world = parent_world * self.nodes[idx].local_to_parent;
        }
    }

    /// 递归更新某节点及其子树的世界变换
    pub fn update_world_transform_recursive(&mut self, idx: usize) {
        if idx >= self.nodes.len() {
            return;
        }

        self.nodes[idx].compute_local_transform();
        let parent_world = match self.nodes[idx].parent_id() {
            Some(p) => self.nodes[p].local_to_world,
            None => Mat4::IDENTITY,
        };
        self.nodes[idx].local_to_world = parent_world * self.nodes[idx].local_to_parent;

        for i in 0..self.children_cache[idx].len() {
            let child = self.children_cache[idx][i];
            self.update_world_transform_recursive(child);
        }
    }
}

impl SceneGraph for NodeSet {
    #[inline]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn parent_of(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|n| n.parent_id())
    }

    #[inline]
    fn world_transform(&self, node: usize) -> Mat4 {
        self.nodes.get(node).map_or(Mat4::IDENTITY, |n| n.local_to_world)
    }

    #[inline]
    fn animated_local_rotation(&self, node: usize) -> Quat {
        self.nodes.get(node).map_or(Quat::IDENTITY, |n| n.animated_rotation())
    }

    fn apply_physics_rotation(&mut self, node: usize, rotation: Quat) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.physics_rotate = Some(rotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> NodeSet {
        let mut set = NodeSet::new();
        let root = set
            .add_node("root", None, NodeTransform::from_translation(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let a = set
            .add_node("a", Some(root), NodeTransform::from_translation(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        set.add_node("b", Some(a), NodeTransform::from_translation(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        set
    }

    #[test]
    fn test_world_positions() {
        let set = chain();
        assert!((set.world_position(2) - Vec3::ZERO).length() < 1e-6);
        assert_eq!(set.find_node_by_name("a"), Some(1));
        assert_eq!(set.parent_of(2), Some(1));
        assert_eq!(set.children(0), &[1]);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut set = NodeSet::new();
        let err = set.add_node("orphan", Some(3), NodeTransform::default());
        assert!(matches!(err, Err(SpringError::UnknownNode { node: 3 })));
    }

    #[test]
    fn test_rotation_propagates_to_children() {
        let mut set = chain();
        set.set_animation_rotate(0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        set.update_world_transforms();
        // 绕 Z 转 90°：向下的链变成指向 +X
        let tip = set.world_position(2);
        assert!((tip - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5, "tip = {:?}", tip);
    }

    #[test]
    fn test_node_access_and_reset_animation() {
        let mut set = chain();
        let link = set.node(2).unwrap();
        assert_eq!(link.link_id(), 2);
        assert!((link.position() - Vec3::ZERO).length() < 1e-6);

        set.node_mut(0).unwrap().animation_rotate = Quat::from_rotation_y(0.8);
        set.set_animation_translate(0, Vec3::X);
        set.update_world_transforms();
        let link = set.node(1).unwrap();
        assert!(link.rotation().dot(Quat::from_rotation_y(0.8)).abs() > 0.9999);
        assert!((link.position() - Vec3::new(1.0, 0.5, 0.0)).length() < 1e-5);

        set.reset_animation();
        set.update_world_transforms();
        assert!(set.node(1).unwrap().rotation().dot(Quat::IDENTITY).abs() > 0.9999);
        assert!((set.world_position(1) - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_physics_rotation_and_clear() {
        let mut set = chain();
        set.apply_physics_rotation(1, Quat::from_rotation_z(std::f32::consts::PI));
        set.update_world_transforms();
        assert!((set.world_position(2) - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        assert!(set.animated_local_rotation(1).dot(Quat::IDENTITY).abs() > 0.9999);

        set.clear_physics_rotations();
        set.update_world_transforms();
        assert!(set.world_position(2).length() < 1e-5);
    }
}
