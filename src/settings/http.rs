//! HTTP settings store
//!
//! Client for the control plane settings API:
//! `GET {url}/settings/{key}` returns `{"activeValue", "value"}` and
//! `PUT {url}/settings/{key}` takes `{"value"}`. Requests use HTTP basic auth
//! when an access key is configured.

use super::SettingsStore;
use crate::error::StoreError;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingResource {
    #[serde(default)]
    active_value: Option<String>,

    #[serde(default)]
    value: Option<String>,
}

#[derive(Serialize)]
struct SettingUpdate<'a> {
    value: &'a str,
}

/// Settings store speaking the control plane settings API
pub struct HttpSettingsStore {
    client: Client,
    base_url: String,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl HttpSettingsStore {
    /// Create a client for the API rooted at `base_url`
    pub fn new(
        base_url: &str,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .build()
            .map_err(|e| StoreError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.filter(|k| !k.is_empty()),
            secret_key,
        })
    }

    fn setting_url(&self, key: &str) -> String {
        format!("{}/settings/{}", self.base_url, key)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_key {
            Some(access_key) => request.basic_auth(access_key, self.secret_key.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl SettingsStore for HttpSettingsStore {
    async fn get_setting(&self, key: &str) -> Result<String> {
        let read_error = |message: String| StoreError::Read {
            key: key.to_string(),
            message,
        };

        let response = self
            .authorize(self.client.get(self.setting_url(key)))
            .send()
            .await
            .map_err(StoreError::from)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(read_error(format!("status {}: {}", status.as_u16(), body)).into());
        }

        let setting: SettingResource = response
            .json()
            .await
            .map_err(|e| read_error(format!("malformed response: {}", e)))?;

        Ok(setting.active_value.or(setting.value).unwrap_or_default())
    }

    async fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.setting_url(key)))
            .json(&SettingUpdate { value })
            .send()
            .await
            .map_err(StoreError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Write {
                key: key.to_string(),
                message: format!("status {}: {}", status.as_u16(), body),
            }
            .into());
        }

        tracing::debug!(key = %key, "Updated setting");
        Ok(())
    }
}
