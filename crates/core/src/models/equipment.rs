//! 电网设备模型
//!
//! 设备记录由公共基础字段加类型专属载荷组成，
//! 按标签分派而非继承。

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// 设备运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Operational,
    OutOfService,
    UnderMaintenance,
    Damaged,
}

/// 设备类型专属载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "equipment_type", rename_all = "snake_case")]
pub enum EquipmentKind {
    Substation {
        #[serde(default)]
        backup_available: bool,
        #[serde(default)]
        critical_customers: Vec<String>,
    },
    PowerLine {
        from_substation: String,
        to_substation: String,
        #[serde(default)]
        line_length_km: f64,
        #[serde(default)]
        max_load_amps: Option<u32>,
    },
    Transformer,
    Pole,
    CircuitBreaker,
}

/// 电网设备记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: String,
    pub name: String,
    pub location: GeoPoint,
    pub status: EquipmentStatus,
    #[serde(default)]
    pub customers_served: u32,
    #[serde(default)]
    pub voltage_level: Option<String>,
    #[serde(default)]
    pub capacity_mva: Option<f64>,
    #[serde(flatten)]
    pub kind: EquipmentKind,
}

impl Equipment {
    pub fn is_substation(&self) -> bool {
        matches!(self.kind, EquipmentKind::Substation { .. })
    }

    pub fn is_power_line(&self) -> bool {
        matches!(self.kind, EquipmentKind::PowerLine { .. })
    }
}
