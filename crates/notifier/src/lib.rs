pub mod delivery;
pub mod policy;
pub mod service;
pub mod templates;

pub use delivery::{DeliverySimulator, SimulatorConfig};
pub use policy::{
    channels_for_tier, max_delay_minutes, update_interval_hours, NotificationPolicy,
};
pub use service::{ChannelCounts, NotificationService};
pub use templates::{render_message, MessageKind};
