//! 着色器编译器
//!
//! 使用 dxc (DirectX Shader Compiler) 将 HLSL compute kernel 编译为 DXIL (`.cso`)
//!
//! ```text
//! dxc -T cs_6_3 -nologo -I kernels [-Od -Zi] -Fo bin/blur.cso kernels/blur.hlsl
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;

use crate::config::{BuildConfig, BuildMode};
use crate::task::ShaderCompileTask;

/// 不输出版权信息
pub const SUPPRESS_BANNER: &str = "-nologo";
/// `-T <profile>`
pub const TARGET_PROFILE: &str = "-T";
/// `-I <dir>`
pub const INCLUDE_DIR: &str = "-I";
/// 关闭优化，仅 debug 模式
pub const DISABLE_OPTIMIZATION: &str = "-Od";
/// 生成调试信息，仅 debug 模式
pub const DEBUG_INFO: &str = "-Zi";
/// `-Fo <file>`
pub const OUTPUT_FILE: &str = "-Fo";

/// 着色器编译器 Trait
pub trait ShaderCompiler {
    /// 编译一个任务
    ///
    /// 编译器无法启动，或者以非 0 状态退出时返回 Err
    fn compile(&self, task: &ShaderCompileTask) -> anyhow::Result<()>;
}

/// DXC 编译器
///
/// 子进程直接继承当前进程的 stdout/stderr，编译器自身的输出不做捕获
#[derive(Debug, Clone)]
pub struct DxcCompiler {
    program: PathBuf,
    target_profile: String,
    include_dir: PathBuf,
    mode: BuildMode,
}

impl DxcCompiler {
    pub fn new(
        program: impl Into<PathBuf>,
        target_profile: impl Into<String>,
        include_dir: impl Into<PathBuf>,
        mode: BuildMode,
    ) -> Self {
        Self {
            program: program.into(),
            target_profile: target_profile.into(),
            include_dir: include_dir.into(),
            mode,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(&config.compiler, &config.target_profile, config.include_dir(), config.mode)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self, task: &ShaderCompileTask) -> Vec<OsString> {
        build_arguments(&task.shader_path, &task.output_path, self.mode, &self.include_dir, &self.target_profile)
    }

    /// 完整的命令行，用于日志输出
    pub fn command_line(&self, task: &ShaderCompileTask) -> String {
        format_command_line(&self.program, &self.arguments(task))
    }
}

impl ShaderCompiler for DxcCompiler {
    fn compile(&self, task: &ShaderCompileTask) -> anyhow::Result<()> {
        let args = self.arguments(task);

        // 先输出命令行，即使编译器无法启动也能看到完整命令
        log::info!("{}", format_command_line(&self.program, &args));

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .with_context(|| format!("failed to execute {:?}", self.program))?;

        if !status.success() {
            anyhow::bail!("{:?} exited with {status} while compiling {:?}", self.program, task.shader_path);
        }

        Ok(())
    }
}

/// 构造 dxc 的参数列表，源文件总是最后一个参数
pub fn build_arguments(
    source: &Path,
    output: &Path,
    mode: BuildMode,
    include_dir: &Path,
    target_profile: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        TARGET_PROFILE.into(),
        target_profile.into(),
        SUPPRESS_BANNER.into(),
        INCLUDE_DIR.into(),
        include_dir.into(),
    ];
    if mode.is_debug() {
        args.push(DISABLE_OPTIMIZATION.into());
        args.push(DEBUG_INFO.into());
    }
    args.push(OUTPUT_FILE.into());
    args.push(output.into());
    args.push(source.into());

    args
}

/// 拼接命令行，包含空白字符或引号的参数会被加上双引号
pub fn format_command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(quote_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_arg(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.into_owned()
    }
}
