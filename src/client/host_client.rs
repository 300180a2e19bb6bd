//! Client for a capture service running directly on a (container) host.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use tokio_tungstenite::Connector;

use super::shark_tank::{CaptureSink, ClientFactory, SharkTank};
use crate::capture::{CaptureOptions, CaptureStreamer};
use crate::configuration::{ClientOptions, Config};
use crate::error_handling::types::{CaptureError, ClientError};
use crate::network::CaptureRequest;
use crate::targets::types::HostTargetList;
use crate::targets::{complete_target, Target, TargetCache};

/// Discovery endpoint, relative to the service URL.
const DISCOVERY_PATH: &str = "discover/mobyshark";
/// Capture websocket endpoint, relative to the service URL.
const CAPTURE_PATH: &str = "capture";

/// Capture service client for a single host.
///
/// Discovered targets get cached until [`SharkTank::clear`], as starting a
/// capture usually needs several lookups.
pub struct HostSharkTank {
    base: Url,
    opts: ClientOptions,
    http: reqwest::Client,
    cache: TargetCache,
}

impl HostSharkTank {
    /// Creates a client for the capture service at `host_url`, which may be a
    /// plain `host:port`.
    ///
    /// Errors
    /// - [`ClientError::InvalidUrl`] for anything beyond scheme, host, port
    ///   and path, such as user information, a query or a fragment.
    /// - [`ClientError::Http`] when the HTTP client cannot be set up.
    pub fn new(host_url: &str, opts: ClientOptions) -> Result<Self, ClientError> {
        let base = parse_host_url(host_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        if opts.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            base,
            opts,
            http: builder.build()?,
            cache: TargetCache::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, rel: &str) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), rel);
        url.set_path(&path);
        url
    }

    /// Fetches the target list from the service and refills the cache.
    async fn discover(&self) -> Result<Vec<Target>, ClientError> {
        let url = self.endpoint(DISCOVERY_PATH);
        debug!(
            "querying targets from capture service {}, time limit {:?}",
            url, self.opts.timeout
        );
        let mut request = self.http.get(url);
        if let Some(token) = &self.opts.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let list: HostTargetList = request.send().await?.error_for_status()?.json().await?;
        let host = self.base.host_str().unwrap_or_default();
        let targets: Vec<Target> = list
            .targets
            .into_iter()
            .map(|mut t| {
                t.node_name = host.to_string();
                t
            })
            .collect();
        debug!("discovered {} targets", targets.len());
        self.cache.set(targets.clone());
        Ok(targets)
    }

    fn connector(&self) -> Result<Option<Connector>, CaptureError> {
        if !self.opts.insecure_skip_verify {
            return Ok(None);
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| CaptureError::InvalidRequest(e.to_string()))?;
        Ok(Some(Connector::NativeTls(tls)))
    }
}

/// Targets lacking interface information come from the user rather than
/// from discovery, and need completing.
fn needs_discovery(target: &Target) -> bool {
    target.network_interfaces.is_empty()
}

#[async_trait]
impl SharkTank for HostSharkTank {
    async fn targets(&self) -> Vec<Target> {
        if !self.cache.is_empty() {
            return self.cache.targets().iter().map(|t| Target::clone(t)).collect();
        }
        match self.discover().await {
            Ok(targets) => targets,
            Err(e) => {
                error!("querying targets from capture service failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn capture(
        &self,
        sink: CaptureSink,
        target: &Target,
        opts: &CaptureOptions,
    ) -> Result<CaptureStreamer, CaptureError> {
        let target = if needs_discovery(target) {
            self.targets().await;
            complete_target(Some(target), &self.cache)?.into_owned()
        } else {
            debug!("skipping unneeded target discovery");
            target.clone()
        };

        let request = CaptureRequest::new(&target, opts)?;
        let mut url = self.endpoint(CAPTURE_PATH);
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| CaptureError::InvalidRequest(format!("not a websocket URL: {}", url)))?;
        request.apply_query(&mut url);
        let ws_request = request.client_request(&url, self.opts.bearer_token.as_deref())?;

        debug!(
            "connecting to capture service {}, time limit {:?}",
            url, self.opts.timeout
        );
        let dial =
            tokio_tungstenite::connect_async_tls_with_config(ws_request, None, false, self.connector()?);
        let dialed = match self.opts.timeout {
            Some(limit) => tokio::time::timeout(limit, dial)
                .await
                .map_err(|_| CaptureError::ConnectTimeout)?,
            None => dial.await,
        };
        let (ws, response) = dialed.map_err(|e| {
            error!("cannot contact capture service via websocket: {}", e);
            CaptureError::Connect(e)
        })?;
        debug!("capture service initial HTTP response: {}", response.status());

        Ok(CaptureStreamer::start(ws, &target, opts, sink))
    }

    fn clear(&self) {
        self.cache.clear();
    }
}

/// Normalizes a capture service URL, defaulting to plain HTTP.
pub fn parse_host_url(host_url: &str) -> Result<Url, ClientError> {
    let with_scheme = if host_url.starts_with("http://") || host_url.starts_with("https://") {
        host_url.to_string()
    } else {
        format!("http://{}", host_url)
    };
    let url = Url::parse(&with_scheme).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    if !url.username().is_empty()
        || url.password().is_some()
        || url.query().is_some()
        || url.fragment().is_some()
        || url.host_str().is_none()
    {
        return Err(ClientError::InvalidUrl(
            "only host name and optional port number allowed".to_string(),
        ));
    }
    Ok(url)
}

/// Creates a [`HostSharkTank`] whenever a host is configured.
pub struct HostClientFactory;

impl ClientFactory for HostClientFactory {
    fn name(&self) -> &'static str {
        "host"
    }

    fn create(&self, config: &Config) -> Result<Option<Box<dyn SharkTank>>, ClientError> {
        match &config.host {
            Some(host) => Ok(Some(Box::new(HostSharkTank::new(
                host,
                config.client_options(),
            )?))),
            None => Ok(None),
        }
    }
}
