use std::sync::Arc;
use std::time::Duration;

use relay_protocol::{Codec, PASSWORD_ENV};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::database::Database;
use crate::error::RelayError;
use crate::transport::Transport;

/// Connection handle for a relay gateway. Cheap to clone.
#[derive(Clone)]
pub struct RelayClient {
    transport: Arc<Transport>,
}

impl RelayClient {
    pub fn new(endpoint: &str, password: impl Into<String>) -> Result<Self, RelayError> {
        Self::builder(endpoint).password(password).build()
    }

    /// Reads the shared secret from `RELAY_PASSWORD`.
    pub fn from_env(endpoint: &str) -> Result<Self, RelayError> {
        let mut builder = Self::builder(endpoint);
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            builder = builder.password(password);
        }
        builder.build()
    }

    pub fn builder(endpoint: &str) -> ClientBuilder {
        ClientBuilder {
            endpoint: endpoint.to_string(),
            password: None,
            codec: Codec::default(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// A database handle. The gateway serves one database, so the name
    /// only namespaces handles on this side.
    pub fn db(&self, name: &str) -> Database {
        Database::new(name, Arc::clone(&self.transport))
    }

    pub fn codec(&self) -> Codec {
        self.transport.codec
    }
}

pub struct ClientBuilder {
    endpoint: String,
    password: Option<String>,
    codec: Codec,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Sent with every request unless a call overrides it.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RelayClient, RelayError> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| RelayError::Config(format!("invalid gateway url {}: {e}", self.endpoint)))?;
        let password = self.password.filter(|p| !p.is_empty()).ok_or_else(|| {
            RelayError::Config(format!("no relay password; pass one or set {PASSWORD_ENV}"))
        })?;
        HeaderValue::from_str(&password)
            .map_err(|_| RelayError::Config("relay password is not a valid header value".into()))?;

        let mut http = reqwest::Client::builder().default_headers(self.headers);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(RelayClient {
            transport: Arc::new(Transport {
                http: http.build()?,
                endpoint,
                password,
                codec: self.codec,
            }),
        })
    }
}
