//! Mock implementations for the data source port
//!
//! In-memory mock that can be used for unit testing without touching
//! real data files.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use outage_core::geo::{haversine_km, GeoPoint};
use outage_core::models::{Customer, Equipment, FieldCrew};
use outage_core::{GridDataSource, OutageError, OutageResult, Topology};

/// Mock implementation of GridDataSource for testing
#[derive(Clone, Default)]
pub struct MockGridDataSource {
    topology: Arc<Mutex<Topology>>,
    crews: Arc<Mutex<Vec<FieldCrew>>>,
    customers: Arc<Mutex<Vec<Customer>>>,
}

impl MockGridDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equipment(self, equipment: Vec<Equipment>) -> Self {
        {
            let mut topology = self.topology.lock().unwrap();
            for item in equipment {
                if item.is_power_line() {
                    topology.power_lines.push(item);
                } else {
                    topology.substations.push(item);
                }
            }
        }
        self
    }

    pub fn with_crews(self, crews: Vec<FieldCrew>) -> Self {
        *self.crews.lock().unwrap() = crews;
        self
    }

    pub fn with_customers(self, customers: Vec<Customer>) -> Self {
        *self.customers.lock().unwrap() = customers;
        self
    }

    pub fn add_customer(&self, customer: Customer) {
        self.customers.lock().unwrap().push(customer);
    }
}

#[async_trait]
impl GridDataSource for MockGridDataSource {
    async fn get_current_grid_state(&self) -> OutageResult<Topology> {
        Ok(self.topology.lock().unwrap().clone())
    }

    async fn get_available_crews(&self) -> OutageResult<Vec<FieldCrew>> {
        Ok(self.crews.lock().unwrap().clone())
    }

    async fn get_customers_in_area(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> OutageResult<Vec<Customer>> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| haversine_km(&c.location, &center) <= radius_km)
            .cloned()
            .collect())
    }

    async fn get_equipment_by_id(&self, equipment_id: &str) -> OutageResult<Equipment> {
        self.topology
            .lock()
            .unwrap()
            .find_equipment(equipment_id)
            .cloned()
            .ok_or_else(|| OutageError::equipment_not_found(equipment_id))
    }
}
