//! Spring Bone 物理系统
//!
//! 管理一个模型的全部骨链、碰撞体与全局参数。
//! 流程：populate → 每帧 [sync_colliders → 子步积分/碰撞/旋转重建 → write_back]

use glam::{Mat4, Quat, Vec3};
use rayon::prelude::*;

use crate::model::SpringSetup;
use crate::skeleton::SceneGraph;
use crate::{Result, SpringError};

use super::bind_direction::{BindDirection, BindDirectionTracker};
use super::collider::{Collider, WorldCollider};
use super::collision::CollisionResolver;
use super::config::{get_config, SpringConfig};
use super::gpu_layout::{BufferCounts, GpuBone, GpuGlobalParams, GpuJointParams, SpringGpuBuffers};
use super::integrator::{BoneState, Integrator, SubstepForces};
use super::params::{ColliderGroupMask, GlobalParameters, JointParameters};
use super::rotation::derive_with_deadzone;

// ============================================================================
// 骨骼与骨链
// ============================================================================

/// 骨链中的一根骨骼（模拟质点）
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨链内索引
    pub id: usize,
    /// 对应的场景节点
    pub node: usize,
    /// 父骨骼（骨链内索引），None 表示模拟根，由骨骼动画直接驱动
    pub parent: Option<usize>,
    /// Verlet 状态
    pub state: BoneState,
    /// 关节参数
    pub params: JointParameters,
}

/// 一条骨链：骨骼按 parent → child 顺序存放
#[derive(Clone, Debug)]
pub struct Spring {
    pub name: String,
    bones: Vec<Bone>,
    /// 引用的碰撞组（声明顺序即碰撞处理顺序）
    collider_groups: Vec<usize>,
    bind: BindDirectionTracker,
    /// 根节点的场景父节点
    root_parent: Option<usize>,
    /// 本帧输出：bones[k] 的本地旋转（叶骨骼保持动画旋转，不写回）
    local_rotations: Vec<Quat>,
    /// 上一帧根位置（子步间插值用）
    previous_root: Vec3,
}

/// 每帧从场景读取的骨链姿态
#[derive(Clone, Debug, Default)]
struct ChainPose {
    root_position: Vec3,
    root_parent_rotation: Quat,
    animated_locals: Vec<Quat>,
}

impl ChainPose {
    /// 读取场景姿态（复用内部缓冲区）
    fn capture<S: SceneGraph>(&mut self, spring: &Spring, scene: &S) {
        self.root_position = scene.world_position(spring.bones[0].node);
        self.root_parent_rotation = spring
            .root_parent
            .map_or(Quat::IDENTITY, |p| scene.world_rotation(p));
        self.animated_locals.clear();
        self.animated_locals
            .extend(spring.bones.iter().map(|b| scene.animated_local_rotation(b.node)));
    }

    /// 根骨骼的动画世界旋转
    #[inline]
    fn root_rotation(&self) -> Quat {
        (self.root_parent_rotation * self.animated_locals[0]).normalize()
    }
}

/// 一帧内所有骨链共享的只读数据
struct FrameContext<'a> {
    substeps: &'a [SubstepForces],
    colliders: &'a [WorldCollider],
    group_members: &'a [Vec<usize>],
    deadzone: f32,
    antiparallel_epsilon: f32,
}

impl Spring {
    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn collider_groups(&self) -> &[usize] {
        &self.collider_groups
    }

    #[inline]
    pub fn local_rotations(&self) -> &[Quat] {
        &self.local_rotations
    }

    /// 骨骼 `bone` 的静止长度（根为 0）
    #[inline]
    pub fn rest_length(&self, bone: usize) -> f32 {
        self.bind.rest_length(bone)
    }

    #[inline]
    pub fn bind_direction(&self, bone: usize) -> Option<&BindDirection> {
        self.bind.get(bone)
    }

    /// 推进一帧：所有子步
    ///
    /// 每个子步按链顺序处理：父骨骼先于子骨骼。
    fn step(&mut self, pose: &ChainPose, ctx: &FrameContext) {
        let count = ctx.substeps.len().max(1);
        let start_root = self.previous_root;

        for (s, forces) in ctx.substeps.iter().enumerate() {
            let alpha = (s + 1) as f32 / count as f32;
            let root = &mut self.bones[0].state;
            root.previous_position = root.current_position;
            root.current_position = start_root.lerp(pose.root_position, alpha);

            let mut parent_world = pose.root_parent_rotation;
            let mut chain_rotation = pose.root_rotation();

            for k in 1..self.bones.len() {
                let parent_position = self.bones[k - 1].state.current_position;
                let bind = self.bind.get(k).copied().unwrap_or_default();
                let rest_dir = bind.world_direction(chain_rotation);

                let bone = &mut self.bones[k];
                Integrator::advance(
                    &mut bone.state,
                    &bone.params,
                    parent_position,
                    rest_dir,
                    bind.length,
                    forces,
                );

                let pushed = CollisionResolver::resolve_filtered(
                    bone.state.current_position,
                    bone.params.hit_radius,
                    bone.params.collider_group_mask,
                    &self.collider_groups,
                    ctx.group_members,
                    ctx.colliders,
                );
                bone.state.current_position =
                    Integrator::constrain_length(pushed, parent_position, bind.length, rest_dir);

                // 旋转重建：静止方向 → 模拟方向
                let simulated_dir = bone.state.current_position - parent_position;
                let delta = derive_with_deadzone(
                    rest_dir,
                    simulated_dir,
                    ctx.deadzone,
                    ctx.antiparallel_epsilon,
                );
                let simulated_world = (delta * chain_rotation).normalize();
                self.local_rotations[k - 1] = (parent_world.inverse() * simulated_world).normalize();

                parent_world = simulated_world;
                chain_rotation = (simulated_world * pose.animated_locals[k]).normalize();
            }
        }

        self.previous_root = pose.root_position;
    }

    /// 把整条链摆回当前姿态下的静止位置
    fn reset_to_pose(&mut self, pose: &ChainPose) {
        self.bones[0].state = BoneState::at_rest(pose.root_position);
        self.previous_root = pose.root_position;

        let mut chain_rotation = pose.root_rotation();
        for k in 1..self.bones.len() {
            let parent_position = self.bones[k - 1].state.current_position;
            let bind = self.bind.get(k).copied().unwrap_or_default();
            let rest = bind.rest_target(chain_rotation, parent_position);
            self.bones[k].state = BoneState::at_rest(rest);
            chain_rotation = (chain_rotation * pose.animated_locals[k]).normalize();
        }
        self.local_rotations.clear();
        self.local_rotations.extend_from_slice(&pose.animated_locals);
    }

    /// 最大长度误差
    fn length_error(&self) -> f32 {
        self.bones
            .iter()
            .skip(1)
            .map(|b| {
                let parent = b.parent.map_or(b.state.current_position, |p| self.bones[p].state.current_position);
                ((b.state.current_position - parent).length() - self.bind.rest_length(b.id)).abs()
            })
            .fold(0.0, f32::max)
    }
}

// ============================================================================
// Spring Bone 系统
// ============================================================================

/// Spring Bone 物理系统（每个模型一个）
///
/// 状态只由 update 修改；write_back 与诊断接口只读。
/// 同一模型的 update 调用必须由调用方串行化。
pub struct SpringBoneSystem {
    springs: Vec<Spring>,
    /// 碰撞体定义（节点本地）
    colliders: Vec<Collider>,
    /// 每个碰撞体所属组构成的掩码
    collider_masks: Vec<ColliderGroupMask>,
    /// 组 → 碰撞体索引
    group_members: Vec<Vec<usize>>,
    /// 世界空间碰撞体（每帧刷新）
    world_colliders: Vec<WorldCollider>,
    /// 全局参数
    globals: GlobalParameters,
    /// populate 时的风相位（reset 用）
    initial_wind_phase: f32,
    /// populate 时的配置快照
    config: SpringConfig,
    /// 已模拟帧数
    frames_simulated: u64,
    /// 上一帧子步时长
    last_dt_sub: f32,

    // --- 预分配缓冲区（避免每帧堆分配） ---

    /// 子步外力
    substep_buf: Vec<SubstepForces>,
    /// 骨链姿态
    pose_buf: Vec<ChainPose>,
    /// GPU 布局缓冲区
    gpu: SpringGpuBuffers,

    /// 上一帧模型世界位置（用于计算移动速度实现惯性）
    prev_model_position: Option<Vec3>,
}

impl SpringBoneSystem {
    /// 构建 Spring Bone 系统
    ///
    /// 遍历每条骨链，记录静止长度与父本地静止方向，并按
    /// (骨骼数, 球数, 胶囊数, 平面数) 分配缓冲区。
    /// 引用了不存在的碰撞组 / 碰撞体 / 节点，或骨链父子关系不成立时失败。
    pub fn populate<S: SceneGraph>(
        setup: &SpringSetup,
        globals: GlobalParameters,
        scene: &S,
    ) -> Result<Self> {
        let config = get_config();
        let node_count = scene.node_count();

        // 第一步：校验碰撞组与碰撞体
        let mut collider_masks = vec![ColliderGroupMask::empty(); setup.colliders.len()];
        for (g, group) in setup.collider_groups.iter().enumerate() {
            for &c in &group.colliders {
                let mask = collider_masks
                    .get_mut(c)
                    .ok_or(SpringError::UnknownCollider { group: g, collider: c })?;
                *mask |= ColliderGroupMask::group(g);
            }
        }
        for collider in &setup.colliders {
            if collider.node >= node_count {
                return Err(SpringError::UnknownNode { node: collider.node });
            }
        }

        // 第二步：构建骨链
        let mut springs = Vec::with_capacity(setup.springs.len());
        for (s, desc) in setup.springs.iter().enumerate() {
            if desc.joints.is_empty() {
                return Err(SpringError::EmptySpring { spring: s });
            }
            if let Some(&group) = desc
                .collider_groups
                .iter()
                .find(|&&g| g >= setup.collider_groups.len())
            {
                return Err(SpringError::UnknownColliderGroup { spring: s, group });
            }

            let mut bones = Vec::with_capacity(desc.joints.len());
            let mut bind = BindDirectionTracker::with_capacity(desc.joints.len());
            for (k, joint) in desc.joints.iter().enumerate() {
                if joint.node >= node_count {
                    return Err(SpringError::UnknownNode { node: joint.node });
                }
                let position = scene.world_position(joint.node);
                let parent = if k == 0 {
                    bind.push(None);
                    None
                } else {
                    let parent_node = desc.joints[k - 1].node;
                    if scene.parent_of(joint.node) != Some(parent_node) {
                        return Err(SpringError::UnknownParent {
                            spring: s,
                            joint: k,
                            node: joint.node,
                            expected_parent: parent_node,
                        });
                    }
                    bind.push(Some(BindDirection::capture(
                        scene.world_rotation(parent_node),
                        scene.world_position(parent_node),
                        position,
                    )));
                    Some(k - 1)
                };
                bones.push(Bone {
                    id: k,
                    node: joint.node,
                    parent,
                    state: BoneState::at_rest(position),
                    params: joint.params,
                });
            }

            let local_rotations = bones
                .iter()
                .map(|b| scene.animated_local_rotation(b.node))
                .collect();
            let previous_root = bones[0].state.current_position;
            springs.push(Spring {
                name: desc.name.clone(),
                root_parent: scene.parent_of(bones[0].node),
                bones,
                collider_groups: desc.collider_groups.clone(),
                bind,
                local_rotations,
                previous_root,
            });
        }

        // 第三步：预分配缓冲区
        let group_members: Vec<Vec<usize>> = setup
            .collider_groups
            .iter()
            .map(|g| g.colliders.clone())
            .collect();
        let world_colliders = setup
            .colliders
            .iter()
            .zip(&collider_masks)
            .map(|(c, &group_mask)| WorldCollider {
                shape: c.to_world(scene.world_transform(c.node)),
                group_mask,
            })
            .collect();
        let counts = BufferCounts::from_colliders(
            springs.iter().map(|s: &Spring| s.bones.len()).sum(),
            &setup.colliders,
        );
        let pose_buf = springs
            .iter()
            .map(|s: &Spring| ChainPose {
                animated_locals: Vec::with_capacity(s.bones.len()),
                ..Default::default()
            })
            .collect();

        log::info!(
            "Spring Bone 构建完成: {} 骨链, {} 骨骼, {} 碰撞体 ({}球 + {}胶囊 + {}平面), {} 碰撞组",
            springs.len(),
            counts.num_bones,
            setup.colliders.len(),
            counts.num_spheres,
            counts.num_capsules,
            counts.num_planes,
            group_members.len()
        );

        Ok(Self {
            springs,
            colliders: setup.colliders.clone(),
            collider_masks,
            group_members,
            world_colliders,
            initial_wind_phase: globals.wind_phase,
            globals,
            config,
            frames_simulated: 0,
            last_dt_sub: 0.0,
            substep_buf: Vec::with_capacity(globals.substep_count() as usize),
            pose_buf,
            gpu: SpringGpuBuffers::with_counts(counts),
            prev_model_position: None,
        })
    }

    /// 同步碰撞体世界几何（每帧一次，快照只读）
    pub fn sync_colliders<S: SceneGraph>(&mut self, scene: &S) {
        for ((world, collider), &group_mask) in self
            .world_colliders
            .iter_mut()
            .zip(&self.colliders)
            .zip(&self.collider_masks)
        {
            *world = WorldCollider {
                shape: collider.to_world(scene.world_transform(collider.node)),
                group_mask,
            };
        }
    }

    /// 推进一帧
    ///
    /// dt 非正或非有限时不做任何事；超过 max_frame_dt 时钳制。
    pub fn update<S: SceneGraph>(&mut self, delta_time: f32, scene: &S) {
        if !(delta_time > 0.0) || !delta_time.is_finite() {
            return;
        }
        let dt = delta_time.min(self.config.max_frame_dt);

        // 碰撞体与骨链姿态快照
        self.sync_colliders(scene);
        for (pose, spring) in self.pose_buf.iter_mut().zip(&self.springs) {
            pose.capture(spring, scene);
        }

        // 子步外力（风相位逐子步推进）
        let substeps = self.globals.substep_count();
        let dt_sub = dt / substeps as f32;
        self.substep_buf.clear();
        for _ in 0..substeps {
            self.substep_buf.push(SubstepForces::from_globals(
                &self.globals,
                dt_sub,
                self.config.inertia_strength,
            ));
            self.globals.advance_wind(dt_sub);
        }
        self.last_dt_sub = dt_sub;

        let ctx = FrameContext {
            substeps: &self.substep_buf,
            colliders: &self.world_colliders,
            group_members: &self.group_members,
            deadzone: self.config.rotation_deadzone,
            antiparallel_epsilon: self.config.antiparallel_epsilon,
        };

        // 骨链之间没有数据依赖，可以并行；链内严格顺序
        let parallel = self.config.parallel_chains
            && self.springs.len() >= self.config.parallel_min_springs;
        if parallel {
            self.springs
                .par_iter_mut()
                .zip(self.pose_buf.par_iter())
                .for_each(|(spring, pose)| spring.step(pose, &ctx));
        } else {
            for (spring, pose) in self.springs.iter_mut().zip(&self.pose_buf) {
                spring.step(pose, &ctx);
            }
        }

        self.frames_simulated += 1;

        if self.config.debug_log {
            log::debug!(
                "[SpringBone] 帧 {}: dt_sub={:.5}, 长度误差={:.2e}, 穿透={:.2e}",
                self.frames_simulated,
                dt_sub,
                self.max_length_error(),
                self.max_penetration()
            );
        }
    }

    /// 把计算出的本地旋转写回场景节点（叶骨骼不写）
    pub fn write_back<S: SceneGraph>(&self, scene: &mut S) {
        for spring in &self.springs {
            let last = spring.bones.len().saturating_sub(1);
            for (bone, rotation) in spring.bones[..last].iter().zip(&spring.local_rotations) {
                scene.apply_physics_rotation(bone.node, *rotation);
            }
        }
    }

    /// 运行预热帧
    pub fn settle<S: SceneGraph>(&mut self, delta_time: f32, scene: &S) {
        for _ in 0..self.globals.settling_frames {
            self.update(delta_time, scene);
        }
    }

    /// 是否已过预热期
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.frames_simulated >= self.globals.settling_frames as u64
    }

    /// 根据模型世界变换推导外部速度（实现惯性）
    ///
    /// 第一次调用只记录位置；速度超过 max_model_speed 视为传送并钳制。
    pub fn set_model_motion(&mut self, model_transform: Mat4, delta_time: f32) {
        let dt = delta_time.max(0.001);
        let curr_pos = model_transform.w_axis.truncate();

        let model_velocity = match self.prev_model_position {
            Some(prev_pos) => (curr_pos - prev_pos) / dt,
            None => Vec3::ZERO,
        };
        self.prev_model_position = Some(curr_pos);

        let max_speed = self.config.max_model_speed;
        let speed_sq = model_velocity.length_squared();
        self.globals.external_velocity = if speed_sq > max_speed * max_speed {
            model_velocity * (max_speed / speed_sq.sqrt())
        } else {
            model_velocity
        };
    }

    /// 重置到当前姿态下的静止状态
    pub fn reset<S: SceneGraph>(&mut self, scene: &S) {
        self.sync_colliders(scene);
        for (pose, spring) in self.pose_buf.iter_mut().zip(self.springs.iter_mut()) {
            pose.capture(spring, scene);
            spring.reset_to_pose(pose);
        }
        self.globals.wind_phase = self.initial_wind_phase;
        self.globals.external_velocity = Vec3::ZERO;
        self.prev_model_position = None;
        self.frames_simulated = 0;
    }

    // ========================================
    // 参数访问
    // ========================================

    #[inline]
    pub fn globals(&self) -> &GlobalParameters {
        &self.globals
    }

    #[inline]
    pub fn globals_mut(&mut self) -> &mut GlobalParameters {
        &mut self.globals
    }

    /// 设置外部速度（宿主直接给出角色速度时使用）
    #[inline]
    pub fn set_external_velocity(&mut self, velocity: Vec3) {
        self.globals.external_velocity = velocity;
    }

    /// 修改某根骨骼的关节参数
    pub fn joint_params_mut(&mut self, spring: usize, bone: usize) -> Option<&mut JointParameters> {
        self.springs
            .get_mut(spring)
            .and_then(|s| s.bones.get_mut(bone))
            .map(|b| &mut b.params)
    }

    // ========================================
    // 诊断
    // ========================================

    pub fn spring_count(&self) -> usize { self.springs.len() }
    pub fn bone_count(&self) -> usize { self.springs.iter().map(|s| s.bones.len()).sum() }
    pub fn collider_count(&self) -> usize { self.colliders.len() }
    pub fn frames_simulated(&self) -> u64 { self.frames_simulated }

    #[inline]
    pub fn spring(&self, index: usize) -> Option<&Spring> {
        self.springs.get(index)
    }

    #[inline]
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    #[inline]
    pub fn world_colliders(&self) -> &[WorldCollider] {
        &self.world_colliders
    }

    /// 某条骨链的骨骼当前位置
    pub fn bone_positions(&self, spring: usize) -> Vec<Vec3> {
        self.springs
            .get(spring)
            .map(|s| s.bones.iter().map(|b| b.state.current_position).collect())
            .unwrap_or_default()
    }

    /// 全部骨链的本地旋转输出 (节点, 旋转)
    pub fn local_rotations(&self) -> Vec<(usize, Quat)> {
        self.springs
            .iter()
            .flat_map(|s| {
                let last = s.bones.len().saturating_sub(1);
                s.bones[..last]
                    .iter()
                    .zip(&s.local_rotations)
                    .map(|(b, r)| (b.node, *r))
            })
            .collect()
    }

    /// 全部骨骼 |当前位置 - 父位置| 与静止长度之差的最大值
    pub fn max_length_error(&self) -> f32 {
        self.springs.iter().map(Spring::length_error).fold(0.0, f32::max)
    }

    /// 骨骼侵入其可碰撞碰撞体的最大深度（hit_radius - 到表面距离）
    pub fn max_penetration(&self) -> f32 {
        let mut worst = 0.0_f32;
        for spring in &self.springs {
            for bone in spring.bones.iter().skip(1) {
                let mask = bone.params.collider_group_mask;
                for &g in spring.collider_groups.iter().filter(|&&g| mask.allows(g)) {
                    for &c in self.group_members.get(g).into_iter().flatten() {
                        if let Some(collider) = self.world_colliders.get(c) {
                            let depth = bone.params.hit_radius
                                - collider.shape.surface_distance(bone.state.current_position);
                            worst = worst.max(depth);
                        }
                    }
                }
            }
        }
        worst
    }

    // ========================================
    // GPU 布局导出
    // ========================================

    /// 刷新并返回 GPU 缓冲区（populate 时按元素数量一次性分配）
    pub fn gpu_buffers(&mut self) -> &SpringGpuBuffers {
        let counts = self.gpu.counts();
        self.gpu.globals = GpuGlobalParams::from_parameters(&self.globals, self.last_dt_sub, counts);

        self.gpu.bones.clear();
        self.gpu.joints.clear();
        let mut offset = 0usize;
        for spring in &self.springs {
            for bone in &spring.bones {
                let bind = spring.bind.get(bone.id).copied().unwrap_or_default();
                let parent_index = bone.parent.map_or(-1, |p| (offset + p) as i32);
                self.gpu.bones.push(GpuBone::new(&bone.state, parent_index, &bind, bone.params.collider_group_mask));
                self.gpu.joints.push(GpuJointParams::from(&bone.params));
            }
            offset += spring.bones.len();
        }

        self.gpu.fill_colliders(&self.world_colliders);
        &self.gpu
    }
}
