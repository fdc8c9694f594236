//! Shader 编译工具
//!
//! 将 `kernels/` 下的所有 `.hlsl` 文件编译为 `bin/<name>.cso`
//!
//! - 配置文件：工作区根目录的 `shader-build.toml`，或 `SHADER_BUILD_CONFIG` 指定的路径
//! - `SHADER_BUILD_MODE=debug|release` 覆盖编译模式
//! - `SHADER_BUILD_FAIL_FAST=1` 遇到第一个失败就停止
//!
//! 任意文件编译失败时以非 0 状态退出

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use ezdx_crate_tools::init_log::init_log;
use ezdx_crate_tools::resource::EzdxPath;
use ezdx_shader_build::config::{BuildConfig, CONFIG_ENV};
use ezdx_shader_build::runner::{BuildSummary, ShaderBuildRunner};

/// 加载配置：显式指定的配置文件必须存在；默认配置文件不存在时使用默认值
fn load_config() -> anyhow::Result<BuildConfig> {
    let mut config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            BuildConfig::from_file(&path).with_context(|| format!("failed to load {CONFIG_ENV}={path:?}"))?
        }
        None => {
            let path = EzdxPath::shader_build_config_path();
            if path.is_file() {
                BuildConfig::from_file(&path)?
            } else {
                BuildConfig::rooted_at(&EzdxPath::workspace_path())
            }
        }
    };
    config.apply_env_overrides()?;

    Ok(config)
}

fn build() -> anyhow::Result<BuildSummary> {
    let config = load_config()?;

    log::info!("Shader input path: {:?}", config.input_dir);
    log::info!("Shader include path: {:?}", config.include_dir());
    log::info!("Shader output path: {:?}", config.output_dir);
    log::info!("Build mode: {}, target profile: {}", config.mode, config.target_profile);

    ShaderBuildRunner::new(config).run()
}

/// 进程退出码：全部成功为 0；任意文件失败，或者配置、目录本身不可用时为 1
fn exit_status(outcome: &anyhow::Result<BuildSummary>) -> u8 {
    match outcome {
        Ok(summary) if summary.is_success() => 0,
        Ok(_) | Err(_) => 1,
    }
}

fn main() -> ExitCode {
    init_log();

    let outcome = build();
    match &outcome {
        Ok(summary) => {
            for failure in &summary.failed {
                log::error!("  {:?}: {}", failure.shader_path, failure.reason);
            }
        }
        Err(err) => log::error!("{err:#}"),
    }

    ExitCode::from(exit_status(&outcome))
}
