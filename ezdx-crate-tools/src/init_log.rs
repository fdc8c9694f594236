use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor};

/// 初始化全局 logger
///
/// - 输出到 stdout，和子进程（编译器）的输出按时间顺序交错
/// - 默认级别为 Info，可以通过 `RUST_LOG` 覆盖
pub fn init_log() {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            let level = record.level();
            let level_style = match level_color(level) {
                Some(color) => buf.default_level_style(level).fg_color(Some(color)),
                None => buf.default_level_style(level),
            };
            let grey_style = level_style.fg_color(Some(Color::Rgb(RgbColor(110, 110, 110))));

            let file = short_file_name(record.file().unwrap_or(""));
            let line = record.line().unwrap_or(0);
            let time = chrono::Local::now().format("%H:%M:%S");

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
                record.args()
            )
        })
        .init();
}

fn level_color(level: log::Level) -> Option<Color> {
    match level {
        log::Level::Info => Some(Color::Ansi(AnsiColor::Green)),
        log::Level::Warn => Some(Color::Ansi(AnsiColor::Yellow)),
        log::Level::Error => Some(Color::Ansi(AnsiColor::Red)),
        log::Level::Debug | log::Level::Trace => None,
    }
}

/// 只保留源文件名，兼容 `/` 和 `\` 两种分隔符
fn short_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
