//! HTTP transport (ureq)
//!
//! Each request runs on its own short-lived thread and hands the result back
//! to the host loop through a completer, so callers never block.

use crate::transport::{join_url, TextCallback, Transport};
use spark_core::{ImageHandle, Result, SparkError};
use spark_runtime::{Completer, Host};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transport fetching from an HTTP(S) base URL
pub struct HttpTransport {
    host: Host,
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(host: Host, base_url: impl Into<String>) -> Self {
        Self {
            host,
            base_url: base_url.into(),
            agent: build_agent(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn spawn_request<T, F>(&self, url: String, request: F, completer: Completer<Result<T>>)
    where
        T: Send + 'static,
        F: FnOnce(&ureq::Agent, &str) -> Result<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        let spawned = thread::Builder::new()
            .name("spark-fetch".to_string())
            .spawn(move || completer.complete(request(&agent, &url)));
        // On failure the closure (and its completer) is dropped, which releases the host.
        if let Err(e) = spawned {
            log::error!("failed to spawn fetch thread: {e}");
        }
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build();
    config.into()
}

fn get(agent: &ureq::Agent, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
    let response = agent.get(url).call().map_err(|e| SparkError::TransportIo {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SparkError::Transport {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn get_text(agent: &ureq::Agent, url: &str) -> Result<String> {
    let mut response = get(agent, url)?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| SparkError::TransportIo {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })
}

fn get_bytes(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let mut response = get(agent, url)?;
    response
        .body_mut()
        .read_to_vec()
        .map_err(|e| SparkError::TransportIo {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })
}

impl Transport for HttpTransport {
    fn fetch_text(&self, path: &str, done: TextCallback) {
        let url = self.locate(path);
        log::debug!("GET {url}");
        let completer = self.host.completer(move |result: Result<String>| done(result));
        self.spawn_request(url, get_text, completer);
    }

    fn fetch_image(&self, target: &ImageHandle) {
        let url = self.locate(target.path());
        let image = target.clone();
        let completer = self.host.completer(move |result: Result<Vec<u8>>| match result {
            Ok(bytes) => {
                image.fulfill(bytes);
            }
            Err(e) => log::warn!("image {} failed to load: {e}", image.path()),
        });
        self.spawn_request(url, get_bytes, completer);
    }

    fn locate(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}
