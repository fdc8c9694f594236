use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导），
/// 不依赖工具启动时的当前目录。
///
/// # 使用示例
/// ```ignore
/// let root = EzdxPath::workspace_path();
/// let config = EzdxPath::shader_build_config_path(); // shader-build.toml
/// ```
pub struct EzdxPath {}
// 核心路径
impl EzdxPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 当前 crate 位于工作区根目录的下一级
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }
}
// shader 相关
impl EzdxPath {
    /// shader 编译配置文件
    pub fn shader_build_config_path() -> PathBuf {
        Self::workspace_path().join("shader-build.toml")
    }
}
