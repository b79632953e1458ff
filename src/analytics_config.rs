//! 学习分析策略配置
//!
//! 最少作答次数、各难度的期望正确率区间都是策略常量而非统计推断结果，
//! 这里给出默认值，并允许通过环境变量或 `config/learn_analytics.toml` 覆盖。
//!
//! ## 环境变量
//! - `LEARN_ANALYTICS__MIN_ATTEMPTS=20`
//! - `LEARN_ANALYTICS__DATABASE_DIR=/var/lib/smart-learn`
//!
//! ## 配置文件
//! ```toml
//! min_attempts = 10
//!
//! [[bands]]
//! lower = 0.85
//! upper = 1.0
//! # ... 共 5 段，依次对应难度 1-5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{clamp_difficulty, MAX_DIFFICULTY, MIN_DIFFICULTY};

// ============================================================================
// 常量定义
// ============================================================================

/// 参与难度评估的最少作答次数
pub const DEFAULT_MIN_ATTEMPTS: usize = 10;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LEARN_ANALYTICS";

/// 默认配置文件（不含扩展名）
pub const CONFIG_FILE_STEM: &str = "config/learn_analytics";

/// 默认正确率区间，依次对应难度 1-5
const DEFAULT_BANDS: [(f64, f64); 5] = [
    (0.85, 1.00),
    (0.70, 0.85),
    (0.50, 0.70),
    (0.30, 0.50),
    (0.00, 0.30),
];

// ============================================================================
// 数据类型定义
// ============================================================================

/// 期望正确率区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessBand {
    pub lower: f64,
    pub upper: f64,
}

/// 正确率相对区间的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    Above,
    Within,
    Below,
}

impl CorrectnessBand {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// 判断正确率落在区间上方、内部还是下方（边界值视为区间内）
    pub fn position(&self, correct_rate: f64) -> BandPosition {
        if correct_rate > self.upper {
            BandPosition::Above
        } else if correct_rate < self.lower {
            BandPosition::Below
        } else {
            BandPosition::Within
        }
    }

    /// 区间描述，如 `50%-70%`
    pub fn describe(&self) -> String {
        format!("{:.0}%-{:.0}%", self.lower * 100.0, self.upper * 100.0)
    }
}

/// 学习分析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// 最少作答次数，低于此值的题目不参与难度评估
    pub min_attempts: usize,
    /// 各难度的期望正确率区间，下标 0 对应难度 1
    pub bands: Vec<CorrectnessBand>,
    /// SQLite 数据目录（命令行入口使用）
    pub database_dir: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_attempts: DEFAULT_MIN_ATTEMPTS,
            bands: DEFAULT_BANDS
                .iter()
                .map(|&(lower, upper)| CorrectnessBand::new(lower, upper))
                .collect(),
            database_dir: None,
        }
    }
}

impl AnalyticsConfig {
    /// 从 `.env`、环境变量和可选的 `config/learn_analytics.toml` 加载配置
    ///
    /// 配置文件不存在时使用默认值；存在但非法时返回错误。
    pub fn from_env_and_file() -> AnalyticsResult<Self> {
        dotenvy::dotenv().ok();
        let file = Path::new(CONFIG_FILE_STEM).with_extension("toml");
        let mut builder = config::Config::builder();
        if file.exists() {
            debug!("[Analytics::Config] Loading {}", file.display());
            builder = builder.add_source(config::File::with_name(CONFIG_FILE_STEM));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let cfg: AnalyticsConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        info!(
            "[Analytics::Config] Loaded: min_attempts={}, bands={}",
            cfg.min_attempts,
            cfg.bands.len()
        );
        Ok(cfg)
    }

    /// 从 TOML 文本加载（未给出的字段取默认值）
    pub fn from_toml_str(content: &str) -> AnalyticsResult<Self> {
        let cfg: AnalyticsConfig = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 校验配置：区间合法、覆盖全部难度、且随难度单调不升
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.min_attempts == 0 {
            return Err(AnalyticsError::Configuration(
                "min_attempts must be at least 1".to_string(),
            ));
        }

        let expected = (MAX_DIFFICULTY - MIN_DIFFICULTY + 1) as usize;
        if self.bands.len() != expected {
            return Err(AnalyticsError::Configuration(format!(
                "expected {} correctness bands, got {}",
                expected,
                self.bands.len()
            )));
        }

        for (idx, band) in self.bands.iter().enumerate() {
            let in_unit = |v: f64| (0.0..=1.0).contains(&v);
            if !in_unit(band.lower) || !in_unit(band.upper) || band.lower > band.upper {
                return Err(AnalyticsError::Configuration(format!(
                    "band for difficulty {} is invalid: [{}, {}]",
                    idx + 1,
                    band.lower,
                    band.upper
                )));
            }
        }

        // 难度越高，期望正确率越低
        for (idx, pair) in self.bands.windows(2).enumerate() {
            let (easier, harder) = (&pair[0], &pair[1]);
            if harder.lower > easier.lower || harder.upper > easier.upper {
                return Err(AnalyticsError::Configuration(format!(
                    "band for difficulty {} expects higher correctness than difficulty {}",
                    idx + 2,
                    idx + 1
                )));
            }
        }

        Ok(())
    }

    /// 获取某难度的期望正确率区间（越界难度先 clamp）
    pub fn band_for(&self, difficulty: i32) -> CorrectnessBand {
        let idx = (clamp_difficulty(difficulty) - MIN_DIFFICULTY) as usize;
        self.bands
            .get(idx)
            .copied()
            .unwrap_or_else(|| {
                let (lower, upper) = DEFAULT_BANDS[idx];
                CorrectnessBand::new(lower, upper)
            })
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AnalyticsConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_attempts, 10);
        assert_eq!(cfg.bands.len(), 5);
    }

    #[test]
    fn test_band_for_clamps_difficulty() {
        let cfg = AnalyticsConfig::default();
        assert_eq!(cfg.band_for(0), cfg.band_for(1));
        assert_eq!(cfg.band_for(8), cfg.band_for(5));
        assert_eq!(cfg.band_for(3), CorrectnessBand::new(0.50, 0.70));
    }

    #[test]
    fn test_band_position() {
        let band = CorrectnessBand::new(0.5, 0.7);
        assert_eq!(band.position(0.9), BandPosition::Above);
        assert_eq!(band.position(0.7), BandPosition::Within);
        assert_eq!(band.position(0.5), BandPosition::Within);
        assert_eq!(band.position(0.2), BandPosition::Below);
        assert_eq!(band.describe(), "50%-70%");
    }

    #[test]
    fn test_from_toml_overrides_min_attempts() {
        let cfg = AnalyticsConfig::from_toml_str("min_attempts = 3").unwrap();
        assert_eq!(cfg.min_attempts, 3);
        assert_eq!(cfg.bands, AnalyticsConfig::default().bands);
    }

    #[test]
    fn test_from_toml_custom_bands() {
        let toml = r#"
            [[bands]]
            lower = 0.9
            upper = 1.0
            [[bands]]
            lower = 0.75
            upper = 0.9
            [[bands]]
            lower = 0.55
            upper = 0.75
            [[bands]]
            lower = 0.35
            upper = 0.55
            [[bands]]
            lower = 0.0
            upper = 0.35
        "#;
        let cfg = AnalyticsConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.band_for(1), CorrectnessBand::new(0.9, 1.0));
        assert_eq!(cfg.band_for(5), CorrectnessBand::new(0.0, 0.35));
    }

    #[test]
    fn test_rejects_non_monotonic_bands() {
        let mut cfg = AnalyticsConfig::default();
        cfg.bands.swap(0, 4);
        assert_matches!(cfg.validate(), Err(AnalyticsError::Configuration(_)));
    }

    #[test]
    fn test_rejects_wrong_band_count() {
        let mut cfg = AnalyticsConfig::default();
        cfg.bands.pop();
        assert_matches!(cfg.validate(), Err(AnalyticsError::Configuration(_)));
    }

    #[test]
    fn test_rejects_zero_min_attempts() {
        let cfg = AnalyticsConfig {
            min_attempts: 0,
            ..AnalyticsConfig::default()
        };
        assert_matches!(cfg.validate(), Err(AnalyticsError::Configuration(_)));
    }

    #[test]
    fn test_rejects_inverted_band() {
        let mut cfg = AnalyticsConfig::default();
        cfg.bands[2] = CorrectnessBand::new(0.7, 0.5);
        assert_matches!(cfg.validate(), Err(AnalyticsError::Configuration(_)));
    }
}
