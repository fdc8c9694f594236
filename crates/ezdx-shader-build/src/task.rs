//! 源文件枚举与编译任务

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// 一个具体的编译任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
}

impl ShaderCompileTask {
    /// 根据源文件路径创建编译任务
    ///
    /// # Returns
    /// 如果源文件没有文件名，返回 None
    pub fn new(shader_path: PathBuf, output_dir: &Path, output_extension: &str) -> Option<Self> {
        let output_path = derive_output_path(&shader_path, output_dir, output_extension)?;
        Some(Self {
            shader_path,
            output_path,
        })
    }
}

/// 枚举 `input_dir` 中扩展名为 `extension` 的文件
///
/// 惰性求值，每次调用都会重新遍历目录；不保证顺序。
/// 以 `.` 开头的文件和目录会被跳过。遍历失败的目录项以 Err 的形式返回，不会被忽略。
pub fn enumerate(
    input_dir: &Path,
    extension: &str,
    recursive: bool,
) -> impl Iterator<Item = anyhow::Result<PathBuf>> + use<> {
    let extension = extension.to_string();
    let walker = walkdir::WalkDir::new(input_dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    walker
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let matched = entry.path().is_file() && entry.path().extension() == Some(OsStr::new(&extension));
                matched.then(|| Ok(entry.into_path()))
            }
            Err(err) => Some(Err(anyhow::Error::new(err).context("failed to walk shader input directory"))),
        })
}

/// 输出路径：`<output_dir>/<去掉最后一个扩展名的文件名>.<extension>`
pub fn derive_output_path(source: &Path, output_dir: &Path, extension: &str) -> Option<PathBuf> {
    let mut file_name = source.file_stem()?.to_os_string();
    file_name.push(".");
    file_name.push(extension);

    Some(output_dir.join(file_name))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}
