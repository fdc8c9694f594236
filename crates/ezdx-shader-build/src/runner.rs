//! 批量编译
//!
//! 单线程、串行：每个文件的编译进程结束后才处理下一个文件。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::compiler::{DxcCompiler, ShaderCompiler};
use crate::config::BuildConfig;
use crate::task::{self, ShaderCompileTask};

/// 单个文件的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub shader_path: PathBuf,
    pub reason: String,
}

/// 一次批量编译的结果
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// 成功生成的输出文件
    pub compiled: Vec<PathBuf>,
    pub failed: Vec<BuildFailure>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// 处理过的源文件数量
    pub fn total(&self) -> usize {
        self.compiled.len() + self.failed.len()
    }
}

pub struct ShaderBuildRunner<C: ShaderCompiler> {
    config: BuildConfig,
    compiler: C,
}

impl ShaderBuildRunner<DxcCompiler> {
    pub fn new(config: BuildConfig) -> Self {
        let compiler = DxcCompiler::from_config(&config);
        Self { config, compiler }
    }
}

impl<C: ShaderCompiler> ShaderBuildRunner<C> {
    pub fn with_compiler(config: BuildConfig, compiler: C) -> Self {
        Self { config, compiler }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// 编译 `input_dir` 下的所有源文件
    ///
    /// 单个文件失败不会返回 Err，而是记录在 [`BuildSummary::failed`] 中；
    /// 只有源码目录不可用、输出目录无法创建时才返回 Err
    pub fn run(&self) -> anyhow::Result<BuildSummary> {
        let config = &self.config;

        fs::read_dir(&config.input_dir)
            .with_context(|| format!("failed to read shader input directory: {:?}", config.input_dir))?;
        fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("failed to create shader output directory: {:?}", config.output_dir))?;

        let sources = task::enumerate(&config.input_dir, &config.source_extension, config.recursive);
        let summary = self.build_sources(sources);

        log::info!(
            "Shader compilation completed: {} compiled, {} failed.",
            summary.compiled.len(),
            summary.failed.len()
        );

        Ok(summary)
    }

    /// 依次编译 `sources`；遍历目录失败的项同样记为失败，路径记为 `input_dir`
    fn build_sources(&self, sources: impl IntoIterator<Item = anyhow::Result<PathBuf>>) -> BuildSummary {
        let mut summary = BuildSummary::default();
        // output path -> 占用该输出的源文件
        let mut claimed = HashMap::new();

        for source in sources {
            let (shader_path, result) = match source {
                Ok(shader_path) => {
                    let result = self.build_one(&shader_path, &mut claimed);
                    (shader_path, result)
                }
                Err(err) => (self.config.input_dir.clone(), Err(err)),
            };

            match result {
                Ok(output_path) => summary.compiled.push(output_path),
                Err(err) => {
                    log::error!("failed to compile shader {shader_path:?}: {err:#}");
                    summary.failed.push(BuildFailure {
                        shader_path,
                        reason: format!("{err:#}"),
                    });

                    if self.config.fail_fast {
                        log::warn!("fail_fast is set, skip the remaining shaders");
                        break;
                    }
                }
            }
        }

        summary
    }

    fn build_one(&self, shader_path: &Path, claimed: &mut HashMap<PathBuf, PathBuf>) -> anyhow::Result<PathBuf> {
        let task = ShaderCompileTask::new(
            shader_path.to_path_buf(),
            &self.config.output_dir,
            &self.config.output_extension,
        )
        .context("cannot derive an output file name")?;

        if let Some(previous) = claimed.get(&task.output_path) {
            anyhow::bail!("output {:?} is already produced by {:?}", task.output_path, previous);
        }
        claimed.insert(task.output_path.clone(), task.shader_path.clone());

        log::debug!("Compiling shader: {:?}", task.shader_path);
        self.compiler.compile(&task)?;

        Ok(task.output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{DEBUG_INFO, DISABLE_OPTIMIZATION};
    use crate::config::BuildMode;
    use std::cell::RefCell;

    /// 只记录编译任务，不启动子进程
    #[derive(Default)]
    struct RecordingCompiler {
        tasks: RefCell<Vec<ShaderCompileTask>>,
        /// 文件名在其中的任务会编译失败
        fail_on: Vec<&'static str>,
    }

    impl RecordingCompiler {
        fn failing_on(fail_on: &[&'static str]) -> Self {
            Self {
                fail_on: fail_on.to_vec(),
                ..Self::default()
            }
        }

        fn invocations(&self) -> usize {
            self.tasks.borrow().len()
        }
    }

    impl ShaderCompiler for RecordingCompiler {
        fn compile(&self, task: &ShaderCompileTask) -> anyhow::Result<()> {
            self.tasks.borrow_mut().push(task.clone());

            let name = task.shader_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.fail_on.iter().any(|fail| *fail == name) {
                anyhow::bail!("compiler exited with exit status: 1");
            }
            Ok(())
        }
    }

    struct Workspace {
        _dir: tempfile::TempDir,
        config: BuildConfig,
    }

    fn workspace(sources: &[&str]) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::rooted_at(dir.path());
        fs::create_dir_all(&config.input_dir).unwrap();
        for source in sources {
            let path = config.input_dir.join(source);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "[numthreads(64, 1, 1)] void main() {}\n").unwrap();
        }
        Workspace { _dir: dir, config }
    }

    #[test]
    fn test_two_kernels_in_debug_mode() {
        let ws = workspace(&["blur.hlsl", "tonemap.hlsl"]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let summary = runner.run().unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.total(), 2);

        let mut tasks = runner.compiler().tasks.borrow().clone();
        tasks.sort_by(|a, b| a.shader_path.cmp(&b.shader_path));
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].shader_path, ws.config.input_dir.join("blur.hlsl"));
        assert_eq!(tasks[0].output_path, ws.config.output_dir.join("blur.cso"));
        assert_eq!(tasks[1].shader_path, ws.config.input_dir.join("tonemap.hlsl"));
        assert_eq!(tasks[1].output_path, ws.config.output_dir.join("tonemap.cso"));

        let dxc = DxcCompiler::from_config(runner.config());
        for task in &tasks {
            let args = dxc.arguments(task);
            assert!(args.iter().any(|arg| arg == DEBUG_INFO));
            assert!(args.iter().any(|arg| arg == DISABLE_OPTIMIZATION));
            assert_eq!(args.last(), Some(&task.shader_path.clone().into_os_string()));
        }
    }

    #[test]
    fn test_no_sources() {
        let ws = workspace(&[]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let summary = runner.run().unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.total(), 0);
        assert_eq!(runner.compiler().invocations(), 0);
        assert!(ws.config.output_dir.is_dir());
    }

    #[test]
    fn test_non_matching_files_are_ignored() {
        let ws = workspace(&["bvh.h", "readme.txt", "blur.hlsl"]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let summary = runner.run().unwrap();
        assert_eq!(summary.compiled, vec![ws.config.output_dir.join("blur.cso")]);
        assert_eq!(runner.compiler().invocations(), 1);
    }

    #[test]
    fn test_continue_on_error() {
        let ws = workspace(&["a.hlsl", "b.hlsl", "c.hlsl"]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::failing_on(&["b.hlsl"]));

        let summary = runner.run().unwrap();
        assert!(!summary.is_success());
        assert_eq!(runner.compiler().invocations(), 3);
        assert_eq!(summary.compiled.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].shader_path, ws.config.input_dir.join("b.hlsl"));
        assert!(summary.failed[0].reason.contains("exit status: 1"));
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let mut ws = workspace(&["a.hlsl", "b.hlsl", "c.hlsl"]);
        ws.config.fail_fast = true;
        let compiler = RecordingCompiler::failing_on(&["a.hlsl", "b.hlsl", "c.hlsl"]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), compiler);

        let summary = runner.run().unwrap();
        assert_eq!(runner.compiler().invocations(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.compiled.is_empty());
    }

    #[test]
    fn test_output_collision_is_rejected() {
        let mut ws = workspace(&["a/common.hlsl", "b/common.hlsl"]);
        ws.config.recursive = true;
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let summary = runner.run().unwrap();
        assert_eq!(runner.compiler().invocations(), 1);
        assert_eq!(summary.compiled, vec![ws.config.output_dir.join("common.cso")]);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].reason.contains("already produced"));
    }

    #[test]
    fn test_discovery_error_fails_the_batch() {
        let ws = workspace(&["blur.hlsl"]);
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let sources = vec![
            Ok(ws.config.input_dir.join("blur.hlsl")),
            Err(anyhow::anyhow!("IO error for operation on locked: Permission denied")),
        ];
        let summary = runner.build_sources(sources);

        assert!(!summary.is_success());
        assert_eq!(runner.compiler().invocations(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].shader_path, ws.config.input_dir);
        assert!(summary.failed[0].reason.contains("Permission denied"));
    }

    #[test]
    fn test_discovery_error_with_fail_fast() {
        let mut ws = workspace(&[]);
        ws.config.fail_fast = true;
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());

        let sources = vec![
            Err(anyhow::anyhow!("failed to walk shader input directory")),
            Ok(ws.config.input_dir.join("blur.hlsl")),
        ];
        let summary = runner.build_sources(sources);

        assert_eq!(runner.compiler().invocations(), 0);
        assert_eq!(summary.failed.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_fails_recursive_run() {
        use std::os::unix::fs::PermissionsExt;

        let mut ws = workspace(&["blur.hlsl", "locked/hidden_from_walk.hlsl"]);
        ws.config.recursive = true;
        let locked = ws.config.input_dir.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root 用户不受目录权限限制
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());
        let summary = runner.run().unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!summary.is_success());
        assert_eq!(runner.compiler().invocations(), 1);
        assert_eq!(summary.failed.len(), 1);
    }

    #[test]
    fn test_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::rooted_at(dir.path());
        let runner = ShaderBuildRunner::with_compiler(config, RecordingCompiler::default());

        assert!(runner.run().is_err());
        assert_eq!(runner.compiler().invocations(), 0);
    }

    #[test]
    fn test_release_mode_arguments() {
        let mut ws = workspace(&["blur.hlsl"]);
        ws.config.mode = BuildMode::Release;
        let runner = ShaderBuildRunner::with_compiler(ws.config.clone(), RecordingCompiler::default());
        runner.run().unwrap();

        let dxc = DxcCompiler::from_config(runner.config());
        let tasks = runner.compiler().tasks.borrow();
        let args = dxc.arguments(&tasks[0]);
        assert!(!args.iter().any(|arg| arg == DEBUG_INFO));
        assert!(!args.iter().any(|arg| arg == DISABLE_OPTIMIZATION));
    }

    #[cfg(unix)]
    #[test]
    fn test_dxc_runner_with_real_processes() {
        let mut ws = workspace(&["blur.hlsl", "tonemap.hlsl"]);

        ws.config.compiler = PathBuf::from("true");
        let summary = ShaderBuildRunner::new(ws.config.clone()).run().unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.compiled.len(), 2);

        ws.config.compiler = PathBuf::from("false");
        let summary = ShaderBuildRunner::new(ws.config.clone()).run().unwrap();
        assert_eq!(summary.failed.len(), 2);
    }
}
