//! Capture service request parameters.
//!
//! The parameters go out both as HTTP headers and as URL query parameters,
//! as some API proxies drop the one or the other on websocket upgrades.

use log::debug;
use reqwest::Url;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

use crate::capture::CaptureOptions;
use crate::error_handling::types::CaptureError;
use crate::targets::Target;

pub const CONTAINER_HEADER: &str = "Clustershark-Container";
pub const NIF_HEADER: &str = "Clustershark-Nif";
pub const CHASTE_HEADER: &str = "Clustershark-Chaste";
pub const FILTER_HEADER: &str = "Clustershark-Filter";

/// A capture request for a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// The target description, as JSON.
    pub container: String,
    /// Slash-separated interface names, or "all".
    pub nif: String,
    pub chaste: bool,
    pub filter: String,
}

impl CaptureRequest {
    pub fn new(target: &Target, opts: &CaptureOptions) -> Result<Self, CaptureError> {
        let container = serde_json::to_string(target)
            .map_err(|e| CaptureError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            container,
            nif: opts.effective_nifs(&target.network_interfaces).join("/"),
            chaste: opts.avoid_promiscuous_mode,
            filter: opts.filter.clone(),
        })
    }

    /// Header name/value pairs; the chaste header has an empty value.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.params(CONTAINER_HEADER, NIF_HEADER, CHASTE_HEADER, FILTER_HEADER)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.params("container", "nif", "chaste", "filter")
    }

    fn params(
        &self,
        container: &'static str,
        nif: &'static str,
        chaste: &'static str,
        filter: &'static str,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![(container, self.container.clone()), (nif, self.nif.clone())];
        if self.chaste {
            params.push((chaste, String::new()));
        }
        if !self.filter.is_empty() {
            params.push((filter, self.filter.clone()));
        }
        params
    }

    /// Appends the query parameters to `url`.
    pub fn apply_query(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in self.query_pairs() {
            pairs.append_pair(k, &v);
        }
    }

    /// Builds the websocket handshake request for `url`, carrying the request
    /// headers and an optional bearer token.
    pub fn client_request(&self, url: &Url, bearer_token: Option<&str>) -> Result<Request, CaptureError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| CaptureError::InvalidRequest(e.to_string()))?;
        let headers = request.headers_mut();
        for (name, value) in self.headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| CaptureError::InvalidRequest(format!("{}: {}", name, e)))?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CaptureError::InvalidRequest(e.to_string()))?;
            headers.insert(name, value);
        }
        if let Some(token) = bearer_token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CaptureError::InvalidRequest(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        debug!("capture request: {} {:?}", url, self.headers());
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nginx() -> Target {
        Target {
            name: "default/nginx".to_string(),
            target_type: "pod".to_string(),
            network_interfaces: vec!["eth0".to_string(), "lo".to_string()],
            capture_service: "sharktank-w1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let req = CaptureRequest::new(&nginx(), &CaptureOptions::default()).unwrap();
        let headers = req.headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, CONTAINER_HEADER);
        let decoded: Target = serde_json::from_str(&headers[0].1).unwrap();
        assert_eq!(decoded, nginx());
        assert_eq!(headers[1], (NIF_HEADER, "eth0/lo".to_string()));
    }

    #[test]
    fn test_options() {
        let opts = CaptureOptions {
            nifs: vec!["eth1".to_string()],
            filter: "tcp port 80".to_string(),
            avoid_promiscuous_mode: true,
        };
        let req = CaptureRequest::new(&nginx(), &opts).unwrap();
        let query = req.query_pairs();
        assert_eq!(query[1], ("nif", "eth1".to_string()));
        assert_eq!(query[2], ("chaste", String::new()));
        assert_eq!(query[3], ("filter", "tcp port 80".to_string()));

        let mut url = Url::parse("ws://localhost:5001/capture").unwrap();
        req.apply_query(&mut url);
        let q = url.query().unwrap();
        assert!(q.contains("nif=eth1"));
        assert!(q.contains("chaste=&") || q.contains("chaste&"));
        assert!(q.contains("filter=tcp+port+80"));
    }

    #[test]
    fn test_client_request_headers() {
        let opts = CaptureOptions {
            avoid_promiscuous_mode: true,
            ..Default::default()
        };
        let req = CaptureRequest::new(&Target::pod("default/nginx"), &opts).unwrap();
        let url = Url::parse("ws://localhost:5001/capture").unwrap();
        let request = req.client_request(&url, Some("s3cr3t")).unwrap();
        let headers = request.headers();
        assert_eq!(headers.get(NIF_HEADER).unwrap(), "all");
        assert_eq!(headers.get(CHASTE_HEADER).unwrap(), "");
        assert!(headers.get(FILTER_HEADER).is_none());
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer s3cr3t");

        let request = req.client_request(&url, None).unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
