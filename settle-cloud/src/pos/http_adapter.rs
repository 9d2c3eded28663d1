//! Vendor-neutral JSON-over-HTTP POS connector
//!
//! Base URL per vendor comes from `POS_ENDPOINTS`; the restaurant's POS API
//! key is sent as a bearer token.

use super::port::{MenuSnapshot, PosConnector, PosConnectors, PosError, PosOrder};
use async_trait::async_trait;
use serde_json::Value;
use shared::models::Restaurant;
use std::collections::HashMap;

pub struct HttpPosConnector {
    http: reqwest::Client,
    vendor: String,
    base: String,
    api_key: String,
}

impl HttpPosConnector {
    pub fn new(http: reqwest::Client, vendor: &str, base: &str, api_key: &str) -> Self {
        Self {
            http,
            vendor: vendor.to_string(),
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn read(resp: reqwest::Response) -> Result<Value, PosError> {
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(body);
        }
        Err(PosError::Rejected {
            status: status.as_u16(),
            message: body["message"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("unknown error")
                .to_string(),
        })
    }
}

#[async_trait]
impl PosConnector for HttpPosConnector {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn sync_menu(&self) -> Result<MenuSnapshot, PosError> {
        let resp = self
            .http
            .get(format!("{}/menu", self.base))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PosError::Network(e.to_string()))?;
        let body = Self::read(resp).await?;
        serde_json::from_value(body).map_err(|e| PosError::Rejected {
            status: 200,
            message: format!("malformed menu payload: {e}"),
        })
    }

    async fn send_order(&self, order: &PosOrder) -> Result<Option<String>, PosError> {
        let resp = self
            .http
            .post(format!("{}/orders", self.base))
            .bearer_auth(&self.api_key)
            .json(order)
            .send()
            .await
            .map_err(|e| PosError::Network(e.to_string()))?;
        let body = Self::read(resp).await?;
        Ok(body["id"]
            .as_str()
            .or_else(|| body["pos_order_id"].as_str())
            .map(String::from))
    }
}

/// Connector factory over the configured vendor endpoints
pub struct HttpPosConnectors {
    http: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpPosConnectors {
    pub fn new(http: reqwest::Client, endpoints: HashMap<String, String>) -> Self {
        Self { http, endpoints }
    }
}

impl PosConnectors for HttpPosConnectors {
    fn for_restaurant(&self, restaurant: &Restaurant) -> Result<Box<dyn PosConnector>, PosError> {
        let settings = restaurant.settings_or_default();
        let (vendor, api_key) = settings
            .pos_credentials()
            .ok_or_else(|| PosError::NotConfigured(restaurant.id.clone()))?;
        let vendor = vendor.to_ascii_lowercase();
        let base = self
            .endpoints
            .get(&vendor)
            .ok_or_else(|| PosError::UnsupportedVendor(vendor.clone()))?;
        Ok(Box::new(HttpPosConnector::new(
            self.http.clone(),
            &vendor,
            base,
            api_key,
        )))
    }
}
