pub mod crew;
pub mod customer;
pub mod equipment;
pub mod incident;
pub mod notification;

pub use crew::{
    AssignmentRole, CrewAssignment, CrewSpecialization, CrewStatus, FieldCrew, SkillLevel,
};
pub use customer::{Channel, Customer, CustomerPriority, CustomerType};
pub use equipment::{Equipment, EquipmentKind, EquipmentStatus};
pub use incident::{IncidentStatus, OutageCause, OutageIncident, OutageSeverity, TimelineEntry};
pub use notification::{DeliveryOutcome, NotificationRecord};
