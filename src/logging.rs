//! 日志初始化
//!
//! 统一使用 tracing；默认 INFO 级别，可用 `RUST_LOG` 覆盖（如 `RUST_LOG=smart_learn_analytics_lib=debug`）。

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 安装全局 fmt subscriber
///
/// 重复调用是安全的：已存在全局 subscriber 时返回 false。
pub fn init_tracing() -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
