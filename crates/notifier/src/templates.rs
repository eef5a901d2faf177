//! 通知消息模板
//!
//! 按消息类型选择模板，将客户称呼、通俗起因、恢复估算、
//! 影响区域与班组状态代入生成个性化消息。

use outage_core::models::{Customer, CustomerType, IncidentStatus, OutageIncident};

/// 通知消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    InitialOutage,
    CrewDispatched,
    RestorationComplete,
    DelayNotification,
}

fn template_for(kind: MessageKind, customer_type: CustomerType) -> &'static str {
    // 关键基础设施客户始终使用专用的优先告警模板
    if customer_type == CustomerType::CriticalInfrastructure {
        return "PRIORITY ALERT for {customer_name}: Power outage affecting your facility \
                due to {cause}. {crew_status}. Estimated restoration: {estimated_time}. \
                Contact emergency services if backup power systems are not functioning.";
    }
    match kind {
        MessageKind::InitialOutage => {
            "Hello {customer_name}, we're aware of a power outage in {affected_area} \
             due to {cause}. Estimated restoration time: {estimated_time}. \
             We'll keep you updated on our progress."
        }
        MessageKind::CrewDispatched => {
            "Update for {customer_name}: {crew_status} to restore power in {affected_area}. \
             Revised estimated restoration: {estimated_time}."
        }
        MessageKind::RestorationComplete => {
            "Good news {customer_name}! Power has been restored to {affected_area}. \
             Thank you for your patience during this outage."
        }
        MessageKind::DelayNotification => {
            "{customer_name}, restoration work in {affected_area} is taking longer than \
             expected due to {cause}. New estimated completion: {estimated_time}."
        }
    }
}

fn crew_status_text(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Reported | IncidentStatus::Confirmed => "Assessing situation",
        IncidentStatus::Assigned => "Crew has been dispatched",
        IncidentStatus::InProgress => "Crew is on site working on repairs",
        IncidentStatus::Resolved => "Power has been restored",
    }
}

/// 渲染个性化通知消息
pub fn render_message(
    kind: MessageKind,
    customer: &Customer,
    incident: &OutageIncident,
) -> String {
    template_for(kind, customer.customer_type)
        .replace("{customer_name}", &customer.name)
        .replace(
            "{estimated_time}",
            &format!("{:.1} hours", incident.estimated_restoration_hours),
        )
        .replace("{cause}", incident.cause.friendly_text())
        .replace("{affected_area}", &customer.service_address)
        .replace("{crew_status}", crew_status_text(incident.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use outage_core::geo::GeoPoint;
    use outage_core::models::{
        CustomerPriority, OutageCause, OutageSeverity,
    };

    fn incident(status: IncidentStatus) -> OutageIncident {
        let mut incident = OutageIncident::new(
            GeoPoint::new(40.7589, -73.9851).unwrap(),
            2.0,
            OutageCause::SevereWeather,
            OutageSeverity::Major,
            vec!["LINE_005".to_string()],
            800,
            0,
            50,
            750,
            6.5,
        )
        .unwrap();
        incident.status = status;
        incident
    }

    fn customer(name: &str, customer_type: CustomerType) -> Customer {
        Customer {
            customer_id: "CUST_001".to_string(),
            name: name.to_string(),
            customer_type,
            priority_level: CustomerPriority::Standard,
            service_address: "45 Oak Avenue".to_string(),
            location: GeoPoint::new(40.76, -73.99).unwrap(),
            communication_preferences: vec![],
            backup_power: false,
            backup_duration_hours: 0,
            contact_phone: None,
            contact_email: None,
        }
    }

    #[test]
    fn test_initial_outage_substitution() {
        let message = render_message(
            MessageKind::InitialOutage,
            &customer("Alice Smith", CustomerType::Residential),
            &incident(IncidentStatus::Reported),
        );
        assert!(message.contains("Alice Smith"));
        assert!(message.contains("severe weather conditions"));
        assert!(message.contains("6.5 hours"));
        assert!(message.contains("45 Oak Avenue"));
        assert!(!message.contains('{'), "未替换的模板变量: {message}");
    }

    #[test]
    fn test_critical_infrastructure_uses_priority_template() {
        let message = render_message(
            MessageKind::InitialOutage,
            &customer("Metro Hospital", CustomerType::CriticalInfrastructure),
            &incident(IncidentStatus::Assigned),
        );
        assert!(message.starts_with("PRIORITY ALERT"));
        assert!(message.contains("Crew has been dispatched"));
    }

    #[test]
    fn test_crew_status_follows_incident_status() {
        let before = render_message(
            MessageKind::CrewDispatched,
            &customer("Bob", CustomerType::Commercial),
            &incident(IncidentStatus::Reported),
        );
        assert!(before.contains("Assessing situation"));

        let during = render_message(
            MessageKind::CrewDispatched,
            &customer("Bob", CustomerType::Commercial),
            &incident(IncidentStatus::InProgress),
        );
        assert!(during.contains("on site"));
    }
}
