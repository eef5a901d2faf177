//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{Duration, Utc};
use uuid::Uuid;

use outage_core::geo::GeoPoint;
use outage_core::models::{
    CrewSpecialization, CrewStatus, Customer, CustomerPriority, CustomerType, Equipment,
    EquipmentKind, EquipmentStatus, FieldCrew, IncidentStatus, OutageCause, OutageIncident,
    OutageSeverity, SkillLevel, Channel,
};

/// Builder for creating test OutageIncident entities
pub struct IncidentBuilder {
    incident: OutageIncident,
}

impl IncidentBuilder {
    pub fn new() -> Self {
        let incident = OutageIncident::new(
            GeoPoint::new(40.7589, -73.9851).unwrap(),
            2.0,
            OutageCause::EquipmentFailure,
            OutageSeverity::Moderate,
            vec!["SUB_001".to_string()],
            250,
            0,
            20,
            230,
            4.0,
        )
        .unwrap();
        Self { incident }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.incident.incident_id = id.to_string();
        self
    }

    pub fn with_cause(mut self, cause: OutageCause) -> Self {
        self.incident.cause = cause;
        self
    }

    pub fn with_severity(mut self, severity: OutageSeverity) -> Self {
        self.incident.severity = severity;
        self
    }

    pub fn with_status(mut self, status: IncidentStatus) -> Self {
        self.incident.status = status;
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.incident.location = GeoPoint::new(latitude, longitude).unwrap();
        self
    }

    pub fn with_customer_counts(mut self, critical: u32, commercial: u32, residential: u32) -> Self {
        self.incident.critical_infrastructure_count = critical;
        self.incident.commercial_customer_count = commercial;
        self.incident.residential_customer_count = residential;
        self.incident.estimated_customers_affected = (critical + commercial + residential).max(1);
        self
    }

    pub fn with_failed_equipment(mut self, ids: Vec<&str>) -> Self {
        self.incident.failed_equipment_ids = ids.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_restoration_estimate(mut self, hours: f64) -> Self {
        self.incident.estimated_restoration_hours = hours;
        self
    }

    pub fn created_hours_ago(mut self, hours: i64) -> Self {
        self.incident.created_at = Utc::now() - Duration::hours(hours);
        self
    }

    pub fn build(self) -> OutageIncident {
        self.incident
    }
}

impl Default for IncidentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test FieldCrew entities
pub struct CrewBuilder {
    crew: FieldCrew,
}

impl CrewBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            crew: FieldCrew {
                crew_id: format!("CREW_{}", &Uuid::new_v4().simple().to_string()[..4]),
                name: "Test Crew".to_string(),
                team_size: 4,
                specialization: CrewSpecialization::LineWorker,
                skill_level: SkillLevel::Senior,
                certifications: vec![],
                equipment: vec![],
                location: GeoPoint::new(40.75, -73.98).unwrap(),
                status: CrewStatus::Available,
                last_location_update: now,
                shift_end: now + Duration::hours(10),
                current_assignments: vec![],
                hours_worked_today: 4.0,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.crew.crew_id = id.to_string();
        self
    }

    pub fn with_specialization(mut self, specialization: CrewSpecialization) -> Self {
        self.crew.specialization = specialization;
        self
    }

    pub fn with_skill_level(mut self, skill_level: SkillLevel) -> Self {
        self.crew.skill_level = skill_level;
        self
    }

    pub fn with_status(mut self, status: CrewStatus) -> Self {
        self.crew.status = status;
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.crew.location = GeoPoint::new(latitude, longitude).unwrap();
        self
    }

    pub fn with_hours_worked(mut self, hours: f64) -> Self {
        self.crew.hours_worked_today = hours;
        self
    }

    pub fn with_assignments(mut self, incident_ids: Vec<&str>) -> Self {
        self.crew.current_assignments = incident_ids.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_equipment(mut self, equipment: Vec<&str>) -> Self {
        self.crew.equipment = equipment.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_shift_remaining_hours(mut self, hours: i64) -> Self {
        self.crew.shift_end = Utc::now() + Duration::hours(hours);
        self
    }

    pub fn build(self) -> FieldCrew {
        self.crew
    }
}

impl Default for CrewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Customer entities
pub struct CustomerBuilder {
    customer: Customer,
}

impl CustomerBuilder {
    pub fn new() -> Self {
        Self {
            customer: Customer {
                customer_id: format!("CUST_{}", &Uuid::new_v4().simple().to_string()[..6]),
                name: "Test Customer".to_string(),
                customer_type: CustomerType::Residential,
                priority_level: CustomerPriority::Standard,
                service_address: "123 Main St".to_string(),
                location: GeoPoint::new(40.759, -73.985).unwrap(),
                communication_preferences: vec![Channel::Sms],
                backup_power: false,
                backup_duration_hours: 0,
                contact_phone: Some("555-0100".to_string()),
                contact_email: Some("test@example.com".to_string()),
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.customer.customer_id = id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.customer.name = name.to_string();
        self
    }

    pub fn with_type(mut self, customer_type: CustomerType) -> Self {
        self.customer.customer_type = customer_type;
        self.customer.priority_level = match customer_type {
            CustomerType::CriticalInfrastructure => CustomerPriority::Critical,
            CustomerType::Commercial => CustomerPriority::High,
            CustomerType::Residential => CustomerPriority::Standard,
        };
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.customer.location = GeoPoint::new(latitude, longitude).unwrap();
        self
    }

    pub fn with_preferences(mut self, channels: Vec<Channel>) -> Self {
        self.customer.communication_preferences = channels;
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Equipment entities
pub struct EquipmentBuilder {
    equipment: Equipment,
}

impl EquipmentBuilder {
    pub fn new() -> Self {
        Self {
            equipment: Equipment {
                equipment_id: "SUB_001".to_string(),
                name: "Main Street Substation".to_string(),
                location: GeoPoint::new(40.7589, -73.9851).unwrap(),
                status: EquipmentStatus::Operational,
                customers_served: 1200,
                voltage_level: Some("138kV".to_string()),
                capacity_mva: Some(50.0),
                kind: EquipmentKind::Substation {
                    backup_available: false,
                    critical_customers: vec![],
                },
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.equipment.equipment_id = id.to_string();
        self
    }

    pub fn with_customers_served(mut self, count: u32) -> Self {
        self.equipment.customers_served = count;
        self
    }

    pub fn with_status(mut self, status: EquipmentStatus) -> Self {
        self.equipment.status = status;
        self
    }

    pub fn as_power_line(mut self, from: &str, to: &str, length_km: f64) -> Self {
        self.equipment.kind = EquipmentKind::PowerLine {
            from_substation: from.to_string(),
            to_substation: to.to_string(),
            line_length_km: length_km,
            max_load_amps: Some(600),
        };
        self
    }

    pub fn build(self) -> Equipment {
        self.equipment
    }
}

impl Default for EquipmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
