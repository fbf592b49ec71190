use serde::{Deserialize, Serialize};

/// The two bookable resource kinds. A booking targets exactly one resource
/// of exactly one kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Room,
    Equipment,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Room => "room",
            ResourceType::Equipment => "equipment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "room" => Some(ResourceType::Room),
            "equipment" => Some(ResourceType::Equipment),
            _ => None,
        }
    }
}

/// Administrative status set by admins, independent of any booking. A
/// resource that is not `available` can never be booked, whatever the
/// requested time range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Available,
    Maintenance,
    Disabled,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Maintenance => "maintenance",
            ResourceStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "maintenance" => ResourceStatus::Maintenance,
            "disabled" => ResourceStatus::Disabled,
            _ => ResourceStatus::Available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub capacity: i64,
    pub location: String,
    pub status: ResourceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: ResourceStatus,
}
