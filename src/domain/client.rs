use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    RoundRobin,
    Priority,
    Smart,
}

impl RotationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "round_robin" => Some(Self::RoundRobin),
            "priority" => Some(Self::Priority),
            "smart" => Some(Self::Smart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Priority => "priority",
            Self::Smart => "smart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: Uuid,
    pub client_key: String,
    pub client_secret: String,
    pub company_name: String,
    pub fee_bps: i32,
    pub rotation_mode: RotationMode,
    pub current_rotation_position: i32,
    pub total_assigned_gateways: i32,
    pub rotation_daily_reset: bool,
    pub last_rotation_at: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub status: ClientStatus,
}

impl Client {
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }
}
