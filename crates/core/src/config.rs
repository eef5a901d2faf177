//! 系统配置
//!
//! 加载顺序：默认值 -> TOML配置文件 -> 环境变量覆盖（前缀OUTAGE_）。

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{OutageError, OutageResult};

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_source: DataSourceConfig,
    pub dispatcher: DispatcherConfig,
    pub notifier: NotifierConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// 数据目录，存放拓扑、班组与客户JSON文件
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 事故默认影响半径（公里）
    pub default_affected_radius_km: f64,
    /// 任务默认工期（小时）
    pub default_duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// 通知投递工作池宽度
    pub worker_count: usize,
    /// 夜间静默开始时刻（小时）
    pub quiet_start_hour: u32,
    /// 夜间静默结束时刻（小时）
    pub quiet_end_hour: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_source: DataSourceConfig {
                data_dir: "data".to_string(),
            },
            dispatcher: DispatcherConfig {
                default_affected_radius_km: 2.0,
                default_duration_hours: 4.0,
            },
            notifier: NotifierConfig {
                worker_count: 16,
                quiet_start_hour: 22,
                quiet_end_hour: 6,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_path: Option<&str>) -> OutageResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(OutageError::config_error(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            // 尝试默认路径，全部缺失时回落到内置默认值
            for candidate in ["config/outage.toml", "outage.toml"] {
                if Path::new(candidate).exists() {
                    builder = builder.add_source(File::new(candidate, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("OUTAGE")
                .separator("_")
                .try_parsing(true),
        );

        let defaults = AppConfig::default();
        let config = builder
            .set_default("data_source.data_dir", defaults.data_source.data_dir)
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default(
                "dispatcher.default_affected_radius_km",
                defaults.dispatcher.default_affected_radius_km,
            )
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default(
                "dispatcher.default_duration_hours",
                defaults.dispatcher.default_duration_hours,
            )
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default("notifier.worker_count", defaults.notifier.worker_count as i64)
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default(
                "notifier.quiet_start_hour",
                defaults.notifier.quiet_start_hour as i64,
            )
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default(
                "notifier.quiet_end_hour",
                defaults.notifier.quiet_end_hour as i64,
            )
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .set_default("observability.log_level", defaults.observability.log_level)
            .map_err(|e| OutageError::config_error(e.to_string()))?
            .build()
            .map_err(|e| OutageError::config_error(e.to_string()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| OutageError::config_error(format!("配置解析失败: {e}")))?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// 配置有效性校验
    pub fn validate(&self) -> OutageResult<()> {
        if self.data_source.data_dir.is_empty() {
            return Err(OutageError::config_error("数据目录不能为空"));
        }
        if self.dispatcher.default_affected_radius_km <= 0.0 {
            return Err(OutageError::config_error("默认影响半径必须为正数"));
        }
        if self.dispatcher.default_duration_hours <= 0.0 {
            return Err(OutageError::config_error("默认工期必须为正数"));
        }
        if self.notifier.worker_count == 0 {
            return Err(OutageError::config_error("工作池宽度必须大于0"));
        }
        if self.notifier.quiet_start_hour > 23 || self.notifier.quiet_end_hour > 23 {
            return Err(OutageError::config_error("静默时段必须在0-23小时之间"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.notifier.worker_count, 16);
        assert_eq!(config.notifier.quiet_start_hour, 22);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[data_source]
data_dir = "testdata"

[notifier]
worker_count = 4
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.data_source.data_dir, "testdata");
        assert_eq!(config.notifier.worker_count, 4);
        // 未覆盖的字段保持默认值
        assert_eq!(config.dispatcher.default_affected_radius_km, 2.0);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = AppConfig::load(Some("/nonexistent/outage.toml"));
        assert!(matches!(result, Err(OutageError::Configuration(_))));
    }

    #[test]
    fn test_invalid_worker_count_rejected() {
        let mut config = AppConfig::default();
        config.notifier.worker_count = 0;
        assert!(config.validate().is_err());
    }
}
