//! Spring Bone 物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 这里只放可调参数；模拟状态归各模型自己的 SpringBoneSystem 所有。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SpringConfig {
    // ========== 惯性效果 ==========
    /// 惯性系数，默认 1.0
    /// 控制人物移动时头发被拖拽的程度
    /// 0.0 = 无惯性，1.0 = 正常，2.0 = 双倍效果
    pub inertia_strength: f32,
    /// 由模型位移推导外部速度时的最大速度，默认 20.0
    /// 超出视为传送，钳制到此值
    pub max_model_speed: f32,

    // ========== 数值稳定 ==========
    /// 旋转死区，模拟方向与静止方向相差小于此值时不产生旋转，默认 1e-5
    /// 消除静止时的微抖动
    pub rotation_deadzone: f32,
    /// 反向判定阈值（dot + 1 小于此值视为 180°），默认 1e-6
    pub antiparallel_epsilon: f32,
    /// 单帧最大时间步长（秒），默认 0.1
    /// 卡顿帧被钳制，防止一次积分过猛
    pub max_frame_dt: f32,

    // ========== 并行 ==========
    /// 是否并行步进相互独立的骨链，默认 true
    pub parallel_chains: bool,
    /// 骨链数量达到此值才启用并行，默认 4
    pub parallel_min_springs: usize,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            // ====== 惯性效果 ======
            inertia_strength: 1.0,
            max_model_speed: 20.0,

            // ====== 数值稳定 ======
            rotation_deadzone: 1e-5,
            antiparallel_epsilon: 1e-6,
            max_frame_dt: 0.1,

            // ====== 并行 ======
            // 骨链很少时线程调度开销比计算本身还大
            parallel_chains: true,
            parallel_min_springs: 4,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SPRING_CONFIG: Lazy<RwLock<SpringConfig>> = Lazy::new(|| {
    RwLock::new(SpringConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SpringConfig {
    SPRING_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SpringConfig) {
    *SPRING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SPRING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SpringConfig::default();
}
