use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GatewayRecord {
    pub id: Uuid,
    pub provider: String,
    /// Encrypted JSON credential blob; goes through the vault before use.
    pub credentials: String,
    pub is_active: bool,
    pub priority: i32,
    pub success_rate: f64,
    pub health_score: f64,
    pub min_amount_minor: i64,
    pub max_amount_minor: i64,
    pub currencies: Vec<String>,
}

/// Decrypted credential shape shared by all adapters. Provider-specific
/// fields that a given adapter does not use stay `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    pub merchant_key: String,
    pub salt: String,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}
