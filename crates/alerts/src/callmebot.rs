use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use common::{Error, Notifier, Result};

pub const CALLMEBOT_URL: &str = "https://api.callmebot.com/whatsapp.php";

/// WhatsApp delivery through the CallMeBot HTTP gateway.
pub struct CallMeBotNotifier {
    phone: String,
    api_key: String,
    endpoint: Url,
    http: Client,
}

impl CallMeBotNotifier {
    pub fn new(phone: &str, api_key: &str) -> Result<Self> {
        Self::with_endpoint(phone, api_key, CALLMEBOT_URL)
    }

    pub fn with_endpoint(phone: &str, api_key: &str, endpoint: &str) -> Result<Self> {
        let phone: String = phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        let api_key = api_key.trim().to_string();
        if phone.is_empty() || api_key.is_empty() {
            return Err(Error::Config("Missing CallMeBot credentials".to_string()));
        }

        let endpoint = Url::parse(endpoint).map_err(|e| Error::Config(e.to_string()))?;
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            phone,
            api_key,
            endpoint,
            http,
        })
    }

    pub fn request_url(&self, text: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("phone", &self.phone)
            .append_pair("text", text)
            .append_pair("apikey", &self.api_key);
        url
    }
}

#[async_trait]
impl Notifier for CallMeBotNotifier {
    async fn send(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Notify(
                "Cannot send an empty WhatsApp message".to_string(),
            ));
        }

        let resp = self
            .http
            .get(self.request_url(text))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        let confirmation = check_delivery(status, &body)?;
        debug!(confirmation = %confirmation, "CallMeBot delivery confirmed");
        Ok(confirmation)
    }
}

/// Accept a gateway response only when it is 2xx and confirms delivery.
pub fn check_delivery(status: u16, body: &str) -> Result<String> {
    let trimmed = body.trim();
    if !(200..300).contains(&status) {
        let detail = if body.is_empty() { "Unknown error" } else { body };
        return Err(Error::Notify(format!(
            "CallMeBot responded with {status}: {detail}"
        )));
    }
    if !trimmed.to_lowercase().contains("message sent") {
        return Err(Error::Notify(if trimmed.is_empty() {
            "CallMeBot did not confirm message delivery".to_string()
        } else {
            trimmed.to_string()
        }));
    }
    Ok(trimmed.to_string())
}
