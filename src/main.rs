use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use smart_learn_analytics_lib::{logging, AnalyticsConfig, AnalyticsEngine, SqliteLearningStore};

/// 默认数据目录（未配置 `LEARN_ANALYTICS__DATABASE_DIR` 时）
const DEFAULT_DATA_DIR: &str = "data";

fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cfg = AnalyticsConfig::from_env_and_file().context("failed to load configuration")?;
    let data_dir = cfg
        .database_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let store = Arc::new(
        SqliteLearningStore::new(&data_dir)
            .with_context(|| format!("failed to open database under {}", data_dir.display()))?,
    );
    let engine = AnalyticsEngine::from_store(store, cfg);

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    let out = engine.handle_json(&buf)?;
    println!("{}", out);
    Ok(())
}
