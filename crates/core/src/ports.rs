//! 数据源访问端口
//!
//! 外部数据源（电网拓扑、班组名册、客户档案）以只读接口的形式
//! 注入各组件，不使用进程级全局状态。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::OutageResult;
use crate::geo::GeoPoint;
use crate::models::{Customer, Equipment, FieldCrew};

/// 电网拓扑快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub substations: Vec<Equipment>,
    #[serde(default)]
    pub power_lines: Vec<Equipment>,
}

impl Topology {
    /// 按ID在变电站与线路中查找设备
    pub fn find_equipment(&self, equipment_id: &str) -> Option<&Equipment> {
        self.substations
            .iter()
            .chain(self.power_lines.iter())
            .find(|e| e.equipment_id == equipment_id)
    }
}

/// 数据源访问接口
///
/// 每次调用至多进行一次同步读取，单条记录损坏不应拖垮整批查询。
#[async_trait]
pub trait GridDataSource: Send + Sync {
    /// 获取当前电网拓扑
    async fn get_current_grid_state(&self) -> OutageResult<Topology>;

    /// 获取全部班组名册
    async fn get_available_crews(&self) -> OutageResult<Vec<FieldCrew>>;

    /// 查询指定半径内的客户
    async fn get_customers_in_area(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> OutageResult<Vec<Customer>>;

    /// 按ID查找设备，不存在时返回EquipmentNotFound
    async fn get_equipment_by_id(&self, equipment_id: &str) -> OutageResult<Equipment>;
}
