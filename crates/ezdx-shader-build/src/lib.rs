//! Compute kernel 批量编译
//!
//! 枚举 `kernels/` 下的所有 `.hlsl` 文件，逐个调用 dxc 编译为 `bin/<name>.cso`。
//! 编译严格串行执行，每个文件的编译命令在执行前输出到 stdout。

pub mod compiler;
pub mod config;
pub mod runner;
pub mod task;
