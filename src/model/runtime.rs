//! 运行时模型 - 节点层次 + Spring Bone
//!
//! 每帧流程：清除物理覆盖 → 刷新世界变换（纯动画姿态）→ 模拟 → 写回 → 再次刷新

use glam::Mat4;

use crate::physics::{GlobalParameters, SpringBoneSystem};
use crate::skeleton::NodeSet;

use super::SpringSetup;

/// 带 Spring Bone 的运行时模型
pub struct SpringModel {
    pub name: String,
    pub skeleton: NodeSet,
    pub setup: SpringSetup,
    pub globals: GlobalParameters,
    /// Spring Bone 系统；构建失败或未构建时为 None，模型照常只跑动画
    pub spring_bones: Option<SpringBoneSystem>,
    /// 模型世界变换
    pub model_transform: Mat4,
}

impl SpringModel {
    pub fn new(name: impl Into<String>, skeleton: NodeSet, setup: SpringSetup, globals: GlobalParameters) -> Self {
        Self {
            name: name.into(),
            skeleton,
            setup,
            globals,
            spring_bones: None,
            model_transform: Mat4::IDENTITY,
        }
    }

    /// 以当前姿态为绑定姿态构建 Spring Bone 系统
    ///
    /// 配置错误时只禁用本模型的 Spring Bone，返回是否成功。
    pub fn build_spring_bones(&mut self) -> bool {
        self.skeleton.clear_physics_rotations();
        self.skeleton.update_world_transforms();

        match SpringBoneSystem::populate(&self.setup, self.globals, &self.skeleton) {
            Ok(system) => {
                self.spring_bones = Some(system);
                true
            }
            Err(e) => {
                log::warn!("模型 '{}' 的 Spring Bone 配置无效，已禁用: {}", self.name, e);
                self.spring_bones = None;
                false
            }
        }
    }

    #[inline]
    pub fn has_spring_bones(&self) -> bool {
        self.spring_bones.is_some()
    }

    /// 设置模型世界变换（用于推导惯性）
    pub fn set_model_transform(&mut self, transform: Mat4, delta_time: f32) {
        self.model_transform = transform;
        if let Some(system) = self.spring_bones.as_mut() {
            system.set_model_motion(transform, delta_time);
        }
    }

    /// 每帧更新
    pub fn update(&mut self, delta_time: f32) {
        self.skeleton.clear_physics_rotations();
        self.skeleton.update_world_transforms();

        if let Some(system) = self.spring_bones.as_mut() {
            system.update(delta_time, &self.skeleton);
            system.write_back(&mut self.skeleton);
            self.skeleton.update_world_transforms();
        }
    }

    /// 运行预热帧
    pub fn settle(&mut self, delta_time: f32) {
        self.skeleton.clear_physics_rotations();
        self.skeleton.update_world_transforms();
        if let Some(system) = self.spring_bones.as_mut() {
            system.settle(delta_time, &self.skeleton);
            system.write_back(&mut self.skeleton);
            self.skeleton.update_world_transforms();
        }
    }

    /// 重置物理到当前动画姿态
    pub fn reset_physics(&mut self) {
        self.skeleton.clear_physics_rotations();
        self.skeleton.update_world_transforms();
        if let Some(system) = self.spring_bones.as_mut() {
            system.reset(&self.skeleton);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpringDesc;
    use crate::physics::JointParameters;
    use crate::skeleton::{NodeTransform, SceneGraph};
    use glam::Vec3;

    fn skeleton() -> NodeSet {
        let mut set = NodeSet::new();
        let root = set.add_node("root", None, NodeTransform::from_translation(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        let a = set.add_node("a", Some(root), NodeTransform::from_translation(Vec3::new(0.0, -0.2, 0.0))).unwrap();
        set.add_node("b", Some(a), NodeTransform::from_translation(Vec3::new(0.0, -0.2, 0.0))).unwrap();
        set
    }

    #[test]
    fn test_invalid_setup_disables_spring_bones() {
        let mut setup = SpringSetup::new();
        setup.add_spring(SpringDesc::from_chain("broken", &[0, 2], JointParameters::default()));
        let mut model = SpringModel::new("test", skeleton(), setup, GlobalParameters::default());
        assert!(!model.build_spring_bones());
        assert!(!model.has_spring_bones());

        // 禁用后仍可正常更新动画
        model.skeleton.set_animation_translate(0, Vec3::X);
        model.update(1.0 / 60.0);
        assert!((model.skeleton.world_position(2) - Vec3::new(1.0, 0.6, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_update_writes_rotations() {
        let mut setup = SpringSetup::new();
        let params = JointParameters {
            stiffness: 0.1,
            drag_force: 0.2,
            gravity_power: 5.0,
            gravity_dir: Vec3::X,
            ..Default::default()
        };
        setup.add_spring(SpringDesc::from_chain("tail", &[0, 1, 2], params));
        let mut model = SpringModel::new("test", skeleton(), setup, GlobalParameters::default());
        assert!(model.build_spring_bones());

        for _ in 0..60 {
            model.update(1.0 / 60.0);
        }
        // 侧向重力把尾巴推向 +X，渲染姿态与模拟位置一致
        let tip = model.skeleton.world_position(2);
        assert!(tip.x > 0.05, "tip = {:?}", tip);
        let simulated = model.spring_bones.as_ref().unwrap().bone_positions(0)[2];
        assert!((tip - simulated).length() < 1e-4, "tip = {:?}, simulated = {:?}", tip, simulated);
    }
}
