//! JSON文件数据源
//!
//! 从数据目录读取电网拓扑、班组名册与客户档案，实现核心的
//! 数据源端口。文件内容惰性加载并缓存；单条损坏的记录跳过
//! 并告警，不拖垮整批读取。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use outage_core::geo::{haversine_km, GeoPoint};
use outage_core::models::{Customer, Equipment, FieldCrew};
use outage_core::{GridDataSource, OutageError, OutageResult, Topology};

const INFRASTRUCTURE_FILE: &str = "infrastructure_map.json";
const CREW_FILE: &str = "crew_roster.json";
const CUSTOMER_FILE: &str = "customer_database.json";

#[derive(Default)]
struct Cache {
    topology: Option<Topology>,
    crews: Option<Vec<FieldCrew>>,
    customers: Option<Vec<Customer>>,
}

/// JSON文件数据源
pub struct JsonDataSource {
    data_dir: PathBuf,
    cache: Arc<RwLock<Cache>>,
}

impl JsonDataSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache: Arc::new(RwLock::new(Cache::default())),
        }
    }

    fn read_json(&self, file_name: &str) -> OutageResult<Value> {
        let path = self.data_dir.join(file_name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            OutageError::data_source_error(format!("读取 {} 失败: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            OutageError::data_source_error(format!("解析 {} 失败: {e}", path.display()))
        })
    }

    /// 逐条反序列化数组，损坏记录跳过并告警
    fn parse_records<T: serde::de::DeserializeOwned>(
        items: &[Value],
        file_name: &str,
    ) -> Vec<T> {
        let mut parsed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(record) => parsed.push(record),
                Err(e) => {
                    warn!(file = file_name, index, error = %e, "跳过损坏的数据记录");
                }
            }
        }
        parsed
    }

    async fn load_topology(&self) -> OutageResult<Topology> {
        if let Some(topology) = self.cache.read().await.topology.clone() {
            return Ok(topology);
        }

        let root = self.read_json(INFRASTRUCTURE_FILE)?;
        let substations = root
            .get("substations")
            .and_then(Value::as_array)
            .map(|items| Self::parse_records::<Equipment>(items, INFRASTRUCTURE_FILE))
            .unwrap_or_default();
        let power_lines = root
            .get("power_lines")
            .and_then(Value::as_array)
            .map(|items| Self::parse_records::<Equipment>(items, INFRASTRUCTURE_FILE))
            .unwrap_or_default();

        let topology = Topology {
            substations,
            power_lines,
        };
        debug!(
            substations = topology.substations.len(),
            power_lines = topology.power_lines.len(),
            "电网拓扑已加载"
        );
        self.cache.write().await.topology = Some(topology.clone());
        Ok(topology)
    }

    async fn load_customers(&self) -> OutageResult<Vec<Customer>> {
        if let Some(customers) = self.cache.read().await.customers.clone() {
            return Ok(customers);
        }

        let root = self.read_json(CUSTOMER_FILE)?;
        let customers = root
            .get("customers")
            .and_then(Value::as_array)
            .map(|items| Self::parse_records::<Customer>(items, CUSTOMER_FILE))
            .unwrap_or_default();
        debug!(customers = customers.len(), "客户档案已加载");
        self.cache.write().await.customers = Some(customers.clone());
        Ok(customers)
    }
}

#[async_trait]
impl GridDataSource for JsonDataSource {
    async fn get_current_grid_state(&self) -> OutageResult<Topology> {
        self.load_topology().await
    }

    async fn get_available_crews(&self) -> OutageResult<Vec<FieldCrew>> {
        if let Some(crews) = self.cache.read().await.crews.clone() {
            return Ok(crews);
        }

        let root = self.read_json(CREW_FILE)?;
        let crews = root
            .get("crews")
            .and_then(Value::as_array)
            .map(|items| Self::parse_records::<FieldCrew>(items, CREW_FILE))
            .unwrap_or_default();
        debug!(crews = crews.len(), "班组名册已加载");
        self.cache.write().await.crews = Some(crews.clone());
        Ok(crews)
    }

    async fn get_customers_in_area(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> OutageResult<Vec<Customer>> {
        let customers = self.load_customers().await?;
        Ok(customers
            .into_iter()
            .filter(|c| haversine_km(&c.location, &center) <= radius_km)
            .collect())
    }

    async fn get_equipment_by_id(&self, equipment_id: &str) -> OutageResult<Equipment> {
        let topology = self.load_topology().await?;
        topology
            .find_equipment(equipment_id)
            .cloned()
            .ok_or_else(|| OutageError::equipment_not_found(equipment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixtures(dir: &Path) {
        fs::write(
            dir.join(INFRASTRUCTURE_FILE),
            r#"{
                "substations": [
                    {
                        "equipment_id": "SUB_001",
                        "name": "Main Street Substation",
                        "location": {"latitude": 40.7589, "longitude": -73.9851},
                        "status": "operational",
                        "customers_served": 1200,
                        "equipment_type": "substation",
                        "backup_available": false,
                        "critical_customers": ["CUST_HOSPITAL"]
                    },
                    {"equipment_id": "SUB_BROKEN", "this_record": "is corrupt"}
                ],
                "power_lines": [
                    {
                        "equipment_id": "LINE_005",
                        "name": "Downtown Feeder",
                        "location": {"latitude": 40.76, "longitude": -73.99},
                        "status": "operational",
                        "customers_served": 450,
                        "equipment_type": "power_line",
                        "from_substation": "SUB_001",
                        "to_substation": "SUB_002",
                        "line_length_km": 3.2
                    }
                ]
            }"#,
        )
        .unwrap();

        fs::write(
            dir.join(CUSTOMER_FILE),
            r#"{
                "customers": [
                    {
                        "customer_id": "CUST_001",
                        "name": "Metro Hospital",
                        "customer_type": "critical_infrastructure",
                        "priority_level": "critical",
                        "service_address": "1 Hospital Way",
                        "location": {"latitude": 40.759, "longitude": -73.985}
                    },
                    {
                        "customer_id": "CUST_FAR",
                        "name": "Distant Farm",
                        "customer_type": "residential",
                        "priority_level": "standard",
                        "service_address": "99 Rural Rd",
                        "location": {"latitude": 41.9, "longitude": -75.0}
                    },
                    {"customer_id": "CUST_BAD"}
                ]
            }"#,
        )
        .unwrap();

        fs::write(
            dir.join(CREW_FILE),
            r#"{
                "crews": [
                    {
                        "crew_id": "CREW_001",
                        "name": "Alpha Line Crew",
                        "team_size": 4,
                        "specialization": "line_worker",
                        "skill_level": "senior",
                        "location": {"latitude": 40.75, "longitude": -73.98},
                        "status": "available",
                        "last_location_update": "2025-06-01T12:00:00Z",
                        "shift_end": "2025-06-01T22:00:00Z",
                        "hours_worked_today": 4.0
                    }
                ]
            }"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_records_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let source = JsonDataSource::new(dir.path());

        let topology = source.get_current_grid_state().await.unwrap();
        // 损坏的变电站记录被跳过，合法记录保留
        assert_eq!(topology.substations.len(), 1);
        assert_eq!(topology.power_lines.len(), 1);
    }

    #[tokio::test]
    async fn test_equipment_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let source = JsonDataSource::new(dir.path());

        let equipment = source.get_equipment_by_id("LINE_005").await.unwrap();
        assert!(equipment.is_power_line());

        let missing = source.get_equipment_by_id("SUB_404").await;
        assert!(matches!(missing, Err(OutageError::EquipmentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_customers_filtered_by_radius() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let source = JsonDataSource::new(dir.path());

        let center = GeoPoint::new(40.7589, -73.9851).unwrap();
        let nearby = source.get_customers_in_area(center, 2.0).await.unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].customer_id, "CUST_001");
    }

    #[tokio::test]
    async fn test_missing_file_is_data_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDataSource::new(dir.path());
        let result = source.get_current_grid_state().await;
        assert!(matches!(result, Err(OutageError::DataSource(_))));
    }
}
