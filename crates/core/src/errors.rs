use thiserror::Error;

use crate::models::IncidentStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutageError {
    #[error("事故不存在: id={id}")]
    IncidentNotFound { id: String },
    #[error("班组不存在: id={id}")]
    CrewNotFound { id: String },
    #[error("设备不存在: id={id}")]
    EquipmentNotFound { id: String },
    #[error("事故 {incident_id} 没有恢复计划")]
    PlanNotFound { incident_id: String },
    #[error("非法的状态转换: {from:?} -> {to:?}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },
    #[error("班组不可用: id={id}")]
    CrewUnavailable { id: String },
    #[error("参数无效: {0}")]
    InvalidParams(String),
    #[error("数据源访问失败: {0}")]
    DataSource(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据序列化错误: {0}")]
    Serialization(String),
}

pub type OutageResult<T> = Result<T, OutageError>;

impl OutageError {
    pub fn incident_not_found<S: Into<String>>(id: S) -> Self {
        Self::IncidentNotFound { id: id.into() }
    }

    pub fn crew_not_found<S: Into<String>>(id: S) -> Self {
        Self::CrewNotFound { id: id.into() }
    }

    pub fn equipment_not_found<S: Into<String>>(id: S) -> Self {
        Self::EquipmentNotFound { id: id.into() }
    }

    pub fn plan_not_found<S: Into<String>>(incident_id: S) -> Self {
        Self::PlanNotFound {
            incident_id: incident_id.into(),
        }
    }

    pub fn crew_unavailable<S: Into<String>>(id: S) -> Self {
        Self::CrewUnavailable { id: id.into() }
    }

    pub fn invalid_params<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn data_source_error<S: Into<String>>(msg: S) -> Self {
        Self::DataSource(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}
