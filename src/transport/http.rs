//! HTTP transport
//!
//! POSTs the canonical JSON of each event to `<url>/<endpoint>`. Requests go
//! through an [`HttpSession`] so callers can swap in their own client.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::Transport;
use crate::client::ClientOptions;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::event::RunEvent;

pub const KIND: &str = "http";

/// Path appended to the base URL when none is configured
pub const DEFAULT_ENDPOINT: &str = "api/v1/lineage";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A POST about to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub verify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests on behalf of the transport.
///
/// Implementations must be safe to call from several threads at once.
/// A returned `Err` means the request did not complete; any status the server
/// answered with belongs in `Ok(HttpResponse)`.
pub trait HttpSession: Send + Sync {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Default session backed by `ureq`
pub struct UreqSession {
    verified: ureq::Agent,
    unverified: ureq::Agent,
}

impl Default for UreqSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqSession {
    pub fn new() -> Self {
        Self {
            verified: Self::agent(true),
            unverified: Self::agent(false),
        }
    }

    fn agent(verify: bool) -> ureq::Agent {
        let tls = ureq::tls::TlsConfig::builder().disable_verification(!verify).build();
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build();
        ureq::Agent::new_with_config(config)
    }
}

impl HttpSession for UreqSession {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let agent = if request.verify { &self.verified } else { &self.unverified };
        let network_error = |e: ureq::Error| Error::Network {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let mut builder = agent
            .post(&request.url)
            .config()
            .timeout_global(Some(request.timeout))
            .build();
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send(request.body.as_bytes()).map_err(network_error)?;
        let status = response.status().as_u16();
        // The body is only used for error messages
        let body = response.body_mut().read_to_string().unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}

/// Validate and normalize a base URL.
///
/// Surrounding whitespace and trailing slashes are removed. The URL must be
/// absolute, use `http` or `https`, spell out its host after `//`, and carry
/// no query or fragment since the endpoint path is appended to it.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| Error::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = trimmed.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return Err(invalid("scheme must be http or https"));
    }

    // The url crate repairs `https:///host` into `https://host`; look at the text as written
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    if host.is_empty() || host.starts_with(':') {
        return Err(invalid("missing host"));
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    if parsed.query().is_some() {
        return Err(invalid("query strings are not allowed in the base url"));
    }
    if parsed.fragment().is_some() {
        return Err(invalid("fragments are not allowed in the base url"));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Settings accepted in the `transport` section for `type: http`
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub url: String,
    pub endpoint: Option<String>,
    /// Seconds
    pub timeout: Option<f64>,
    pub verify: Option<bool>,
    pub api_key: Option<String>,
}

/// Resolved HTTP transport configuration
#[derive(Clone)]
pub struct HttpConfig {
    pub url: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub verify: bool,
    pub api_key: Option<String>,
    pub session: Arc<dyn HttpSession>,
}

impl fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConfig")
            .field("url", &self.url)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("verify", &self.verify)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpConfig {
    /// Build from the explicit URL and options of a directly constructed client
    pub fn from_options(url: &str, options: &ClientOptions, session: Arc<dyn HttpSession>) -> Result<Self> {
        Ok(Self {
            url: normalize_url(url)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: options.timeout,
            verify: options.verify,
            api_key: options.api_key.clone(),
            session,
        })
    }

    /// Build from a `transport` config section
    pub fn from_config(config: &TransportConfig, session: Arc<dyn HttpSession>) -> Result<Self> {
        let settings: HttpSettings = config.settings_as().map_err(|e| Error::TransportConfig {
            kind: KIND.to_string(),
            reason: e.to_string(),
        })?;

        let timeout = match settings.timeout {
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| Error::TransportConfig {
                kind: KIND.to_string(),
                reason: format!("invalid timeout {}: {}", secs, e),
            })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            url: normalize_url(&settings.url)?,
            endpoint: settings.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout,
            verify: settings.verify.unwrap_or(true),
            api_key: settings.api_key.filter(|k| !k.is_empty()),
            session,
        })
    }
}

/// Sends events synchronously to an HTTP lineage endpoint
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpConfig,
    target: String,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let target = format!("{}/{}", config.url, config.endpoint.trim_start_matches('/'));
        Self { config, target }
    }

    pub fn from_config(config: &TransportConfig, session: Arc<dyn HttpSession>) -> Result<Self> {
        Ok(Self::new(HttpConfig::from_config(config, session)?))
    }

    /// Full URL events are POSTed to
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.config.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
        }
        headers
    }
}

impl Transport for HttpTransport {
    fn kind(&self) -> &str {
        KIND
    }

    fn emit(&self, event: &RunEvent) -> Result<()> {
        let request = HttpRequest {
            url: self.target.clone(),
            body: event.to_canonical_json()?,
            headers: self.headers(),
            timeout: self.config.timeout,
            verify: self.config.verify,
        };

        let response = self.config.session.post(&request)?;
        if !response.is_success() {
            return Err(Error::Delivery {
                url: self.target.clone(),
                status: response.status,
                body: response.body,
            });
        }

        log::debug!("Delivered lineage event to {} ({})", self.target, response.status);
        Ok(())
    }

    fn url(&self) -> Option<&str> {
        Some(&self.config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Job, Run, RunState};
    use std::sync::Mutex;

    struct StubSession {
        status: u16,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl StubSession {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpSession for StubSession {
        fn post(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: self.status,
                body: "stub".to_string(),
            })
        }
    }

    struct DownSession;

    impl HttpSession for DownSession {
        fn post(&self, request: &HttpRequest) -> Result<HttpResponse> {
            Err(Error::Network {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn event() -> RunEvent {
        RunEvent::new(
            RunState::Start,
            "2021-11-03T10:53:52.427343",
            Run::new("69f4acab-b87d-4fc0-b27b-8ea950370ff3"),
            Job::new("openlineage", "job"),
            "producer",
        )
    }

    #[test]
    fn test_normalize_url_rejects_malformed() {
        for url in [
            "notanurl",
            "http://",
            "example.com",
            "http:example.com",
            "http:/example.com",
            "196.168.0.1",
            "ftp://example.com",
            "https:///example.com",
            "http://:5000",
            "http://user@",
            "http://example.com?x=1",
            "http://example.com/?",
            "http://example.com#top",
            "",
        ] {
            let err = normalize_url(url).unwrap_err();
            assert!(matches!(err, Error::InvalidUrl { .. }), "{url:?} should be rejected");
        }
    }

    #[test]
    fn test_normalize_url_trims() {
        assert_eq!(normalize_url("http://196.168.0.1").unwrap(), "http://196.168.0.1");
        assert_eq!(normalize_url("http://example.com  ").unwrap(), "http://example.com");
        assert_eq!(normalize_url(" http://example.com").unwrap(), "http://example.com");
        assert_eq!(normalize_url("  http://marquez:5000  ").unwrap(), "http://marquez:5000");
        assert_eq!(normalize_url("  https://marquez  ").unwrap(), "https://marquez");
        assert_eq!(normalize_url("https://marquez/ ").unwrap(), "https://marquez");
        assert_eq!(normalize_url("http://marquez:5000/lineage/").unwrap(), "http://marquez:5000/lineage");
        assert_eq!(normalize_url("http://[::1]:5000").unwrap(), "http://[::1]:5000");
    }

    #[test]
    fn test_emit_posts_canonical_json() {
        let session = StubSession::new(200);
        let config = HttpConfig::from_options("http://example.com", &ClientOptions::default(), session.clone()).unwrap();
        let transport = HttpTransport::new(config);

        transport.emit(&event()).unwrap();

        let requests = session.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://example.com/api/v1/lineage");
        assert_eq!(requests[0].body, event().to_canonical_json().unwrap());
        assert_eq!(requests[0].timeout, Duration::from_secs(5));
        assert!(requests[0].verify);
        assert_eq!(
            requests[0].headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_api_key_sets_authorization() {
        let session = StubSession::new(201);
        let config = TransportConfig::new("http")
            .with("url", "https://lineage.internal")
            .with("endpoint", "/custom/lineage")
            .with("api_key", "secret")
            .with("timeout", 1.5)
            .with("verify", false);
        let transport = HttpTransport::from_config(&config, session.clone()).unwrap();
        assert_eq!(transport.target(), "https://lineage.internal/custom/lineage");

        transport.emit(&event()).unwrap();

        let requests = session.requests.lock().unwrap();
        assert!(
            requests[0]
                .headers
                .contains(&("Authorization".to_string(), "Bearer secret".to_string()))
        );
        assert_eq!(requests[0].timeout, Duration::from_millis(1500));
        assert!(!requests[0].verify);
    }

    #[test]
    fn test_non_success_is_delivery_error() {
        let transport = HttpTransport::new(
            HttpConfig::from_options("http://example.com", &ClientOptions::default(), StubSession::new(500)).unwrap(),
        );
        let err = transport.emit(&event()).unwrap_err();
        assert!(matches!(err, Error::Delivery { status: 500, .. }));
    }

    #[test]
    fn test_network_failure_propagates() {
        let transport = HttpTransport::new(
            HttpConfig::from_options("http://example.com", &ClientOptions::default(), Arc::new(DownSession)).unwrap(),
        );
        let err = transport.emit(&event()).unwrap_err();
        assert!(err.is_delivery());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let options = ClientOptions {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let config = HttpConfig::from_options("http://example.com", &options, StubSession::new(200)).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
