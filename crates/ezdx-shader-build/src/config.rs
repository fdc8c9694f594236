//! 编译配置
//!
//! 默认值对应 `kernels/*.hlsl` → `bin/*.cso`，可以通过 TOML 文件和环境变量覆盖。

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "SHADER_BUILD_CONFIG";
/// 覆盖编译模式的环境变量，取值 `debug` / `release`
pub const MODE_ENV: &str = "SHADER_BUILD_MODE";
/// 覆盖失败策略的环境变量
pub const FAIL_FAST_ENV: &str = "SHADER_BUILD_FAIL_FAST";

#[cfg(windows)]
const DEFAULT_COMPILER: &str = "dxc.exe";
#[cfg(not(windows))]
const DEFAULT_COMPILER: &str = "dxc";

/// 编译模式
///
/// 配置文件和环境变量使用相同的解析规则（[`FromStr`]，不区分大小写）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// 生成调试信息 (`-Zi`)，关闭优化 (`-Od`)
    #[default]
    Debug,
    Release,
}

impl BuildMode {
    pub fn is_debug(self) -> bool {
        self == BuildMode::Debug
    }
}

impl FromStr for BuildMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            other => anyhow::bail!("unknown build mode {other:?}, expected `debug` or `release`"),
        }
    }
}

impl<'de> Deserialize<'de> for BuildMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => f.write_str("debug"),
            BuildMode::Release => f.write_str("release"),
        }
    }
}

/// 一次批量编译的全部配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// kernel 源码目录，同时作为 include 目录传给编译器
    pub input_dir: PathBuf,

    /// 编译产物的输出目录
    pub output_dir: PathBuf,

    /// 参与编译的源文件扩展名（不含 `.`）
    pub source_extension: String,

    /// 编译产物的扩展名（不含 `.`）
    pub output_extension: String,

    /// dxc 的 target profile，例如 `cs_6_3`
    pub target_profile: String,

    /// 编译器可执行文件
    ///
    /// 只有文件名时在 `PATH` 中查找；包含目录的相对路径和其他目录一样以配置文件所在目录为基准
    pub compiler: PathBuf,

    pub mode: BuildMode,

    /// 第一个文件编译失败后立即停止；默认继续编译剩余文件
    pub fail_fast: bool,

    /// 是否递归进入 `input_dir` 的子目录
    pub recursive: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("kernels"),
            output_dir: PathBuf::from("bin"),
            source_extension: "hlsl".to_string(),
            output_extension: "cso".to_string(),
            target_profile: "cs_6_3".to_string(),
            compiler: PathBuf::from(DEFAULT_COMPILER),
            mode: BuildMode::default(),
            fail_fast: false,
            recursive: false,
        }
    }
}

impl BuildConfig {
    /// 默认配置，相对目录以 `root` 为基准
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.resolve_paths(root);
        config
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值
    ///
    /// 相对目录（以及带目录的相对 `compiler` 路径）以配置文件所在目录为基准
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("failed to read config file: {path:?}"))?;

        let mut config: BuildConfig =
            toml::from_str(&content).with_context(|| format!("failed to parse config file: {path:?}"))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        Ok(config)
    }

    /// 使用进程环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// 使用 `lookup` 提供的变量覆盖配置
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(mode) = lookup(MODE_ENV) {
            self.mode = mode.parse().with_context(|| format!("invalid {MODE_ENV}"))?;
        }
        if let Some(fail_fast) = lookup(FAIL_FAST_ENV) {
            self.fail_fast = parse_flag(&fail_fast).with_context(|| format!("invalid {FAIL_FAST_ENV}"))?;
        }

        Ok(())
    }

    /// include 目录即源码目录
    pub fn include_dir(&self) -> &Path {
        &self.input_dir
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.input_dir.is_relative() {
            self.input_dir = base.join(&self.input_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        if self.compiler.is_relative() && self.compiler.components().count() > 1 {
            self.compiler = base.join(&self.compiler);
        }
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
