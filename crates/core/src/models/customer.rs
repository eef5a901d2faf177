//! 客户模型
//!
//! 客户记录包含类型分级、联系偏好与备用电源信息，
//! 供通知调度器决定渠道与时限。

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// 客户类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Residential,
    Commercial,
    CriticalInfrastructure,
}

/// 客户服务优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerPriority {
    Standard,
    High,
    Critical,
}

/// 通信渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    Phone,
}

/// 客户记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub customer_type: CustomerType,
    pub priority_level: CustomerPriority,
    pub service_address: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub communication_preferences: Vec<Channel>,
    #[serde(default)]
    pub backup_power: bool,
    #[serde(default)]
    pub backup_duration_hours: u32,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl Customer {
    pub fn is_critical_infrastructure(&self) -> bool {
        self.customer_type == CustomerType::CriticalInfrastructure
    }
}
