//! [`RemoteState`] over the content service's HTTP API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use trellis_core::{
    BlockPatch, Credentials, LocalBlock, LocalPartial, PartialPatch, RemoteBlock, RemoteError,
    RemotePartial, RemoteState, Site, SiteId, ThemeConfig,
};

use crate::wire::{api_error, decode_body, join_url, parse_base_url};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking HTTP client for one API endpoint, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    agent: ureq::Agent,
    base_url: Url,
    token: String,
}

impl HttpRemote {
    /// Fails with [`RemoteError::InvalidUrl`] before any request is made when
    /// `api_url` is unusable.
    pub fn new(credentials: &Credentials) -> Result<Self, RemoteError> {
        let base_url = parse_base_url(&credentials.api_url)?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("trellis/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            agent,
            base_url,
            token: credentials.api_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        join_url(&self.base_url, segments).into()
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json")
    }

    fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        tracing::debug!(method = "GET", url = %url, "remote call");
        let response = self.request("GET", url).call().map_err(|e| map_err(url, e))?;
        read_json(url, response)
    }

    fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        tracing::debug!(method, url = %url, "remote call");
        let response = self
            .request(method, url)
            .send_json(body)
            .map_err(|e| map_err(url, e))?;
        read_json(url, response)
    }

    /// Send and ignore the response body.
    fn send_discard<B: Serialize>(&self, method: &str, url: &str, body: &B) -> Result<(), RemoteError> {
        tracing::debug!(method, url = %url, "remote call");
        self.request(method, url)
            .send_json(body)
            .map_err(|e| map_err(url, e))?;
        Ok(())
    }

    fn delete(&self, url: &str) -> Result<(), RemoteError> {
        tracing::debug!(method = "DELETE", url = %url, "remote call");
        self.request("DELETE", url)
            .call()
            .map_err(|e| map_err(url, e))?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, RemoteError> {
    let body = response.into_string().map_err(|e| RemoteError::Decode {
        url: url.to_owned(),
        message: e.to_string(),
    })?;
    decode_body(url, &body)
}

fn map_err(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let err = api_error(status, &body);
            tracing::warn!(status, url = %url, error = %err, "remote call rejected");
            err
        }
        ureq::Error::Transport(transport) => {
            tracing::warn!(url = %url, error = %transport, "remote call failed");
            RemoteError::Transport {
                url: url.to_owned(),
                message: transport.to_string(),
            }
        }
    }
}

impl RemoteState for HttpRemote {
    fn get_site(&self, site: &SiteId) -> Result<Site, RemoteError> {
        self.get(&self.url(&["sites", site.0.as_str()]))
    }

    fn get_blocks(&self, site: &SiteId) -> Result<Vec<RemoteBlock>, RemoteError> {
        self.get(&self.url(&["sites", site.0.as_str(), "blocks"]))
    }

    fn get_partials(&self, site: &SiteId) -> Result<Vec<RemotePartial>, RemoteError> {
        self.get(&self.url(&["sites", site.0.as_str(), "partials"]))
    }

    fn create_block(&self, site: &SiteId, block: &LocalBlock) -> Result<RemoteBlock, RemoteError> {
        self.send("POST", &self.url(&["sites", site.0.as_str(), "blocks"]), block)
    }

    fn update_block(
        &self,
        site: &SiteId,
        id: &str,
        patch: &BlockPatch,
    ) -> Result<(), RemoteError> {
        self.send_discard("PATCH", &self.url(&["sites", site.0.as_str(), "blocks", id]), patch)
    }

    fn delete_block(&self, site: &SiteId, id: &str) -> Result<(), RemoteError> {
        self.delete(&self.url(&["sites", site.0.as_str(), "blocks", id]))
    }

    fn create_partial(
        &self,
        site: &SiteId,
        partial: &LocalPartial,
    ) -> Result<RemotePartial, RemoteError> {
        self.send("POST", &self.url(&["sites", site.0.as_str(), "partials"]), partial)
    }

    fn update_partial(
        &self,
        site: &SiteId,
        id: &str,
        patch: &PartialPatch,
    ) -> Result<(), RemoteError> {
        self.send_discard("PATCH", &self.url(&["sites", site.0.as_str(), "partials", id]), patch)
    }

    fn delete_partial(&self, site: &SiteId, id: &str) -> Result<(), RemoteError> {
        self.delete(&self.url(&["sites", site.0.as_str(), "partials", id]))
    }

    fn update_site_theme(&self, site: &SiteId, theme: &ThemeConfig) -> Result<(), RemoteError> {
        self.send_discard("PATCH", &self.url(&["sites", site.0.as_str(), "theme"]), theme)
    }
}
