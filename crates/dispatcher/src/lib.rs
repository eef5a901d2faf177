pub mod dispatch;
pub mod planner;
pub mod priority;
pub mod statistics;
pub mod store;

pub use dispatch::{CrewDispatcher, CrewRecommendation, CrewRegistry, CrewScore};
pub use planner::{RestorationPlan, RestorationPlanner, RestorationTask};
pub use priority::priority_score;
pub use statistics::OutageStatistics;
pub use store::{IncidentStore, TransitionEvent};
