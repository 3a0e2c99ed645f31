use crate::config::SiteConfig;
use crate::core::{Page, PageSource};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Paged reads from the WooCommerce REST API (`/wp-json/wc/v3/{resource}`).
#[derive(Debug, Clone)]
pub struct WooCommerceSource {
    client: Client,
    endpoint: String,
    consumer_key: String,
    consumer_secret: String,
}

impl WooCommerceSource {
    pub fn new(site: &SiteConfig, resource: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("woo-export/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/wp-json/wc/v3/{}",
                site.site_url.trim_end_matches('/'),
                resource
            ),
            consumer_key: site.consumer_key.clone(),
            consumer_secret: site.consumer_secret.clone(),
        })
    }
}

#[async_trait]
impl PageSource for WooCommerceSource {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page> {
        tracing::debug!("Making API request to: {} (page {})", self.endpoint, page);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("page", page.to_string()),
                ("per_page", page_size.to_string()),
                ("consumer_key", self.consumer_key.clone()),
                ("consumer_secret", self.consumer_secret.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body = response.text().await?;
        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| EtlError::MalformedResponse {
                message: format!("page {} is not valid JSON: {}", page, e),
            })?;

        match json {
            serde_json::Value::Array(records) => Ok(Page::from_records(records, page_size)),
            other => Err(EtlError::MalformedResponse {
                message: format!(
                    "expected a JSON array on page {}, got {}",
                    page,
                    json_kind(&other)
                ),
            }),
        }
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
