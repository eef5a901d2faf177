//! Shared test utilities: entity builders and a mock data source.

pub mod builders;
pub mod mocks;

pub use builders::{CrewBuilder, CustomerBuilder, EquipmentBuilder, IncidentBuilder};
pub use mocks::MockGridDataSource;
