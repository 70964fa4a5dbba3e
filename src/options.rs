use serde::Deserialize;

use crate::{
    error::{SessionError, SessionResult},
    id::DEFAULT_ID_LENGTH,
};

/// Configuration of the [`SessionManager`](crate::SessionManager), usually parsed from
/// a JSON string such as `{"cookieName":"SID","gcLifetime":3600}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
    /// The name of the cookie (or query parameter) carrying the session ID (default: `"SessionId"`)
    pub cookie_name: String,
    /// Whether to send the session cookie to the client (default: `true`)
    pub enable_set_cookie: bool,
    /// Interval between garbage collection sweeps, in seconds (default: 1 hour)
    pub gc_lifetime: u64,
    /// Inactivity threshold in seconds after which sessions expire. Defaults to
    /// `gc_lifetime` when unset or 0.
    pub max_lifetime: u64,
    /// Mark the session cookie `Secure` when the request came in over HTTPS (default: `false`)
    pub secure: bool,
    /// Lifetime of the session cookie in seconds. 0 means a browser-session cookie. (default: 0)
    pub cookie_lifetime: u64,
    /// Provider-specific configuration string: a directory for the file provider,
    /// `address,pool_size,password` for Redis, or a JSON object for the cookie provider
    pub provider_config: String,
    /// The session cookie's `Domain` attribute (default: none)
    pub domain: Option<String>,
    /// Number of random bytes in generated session IDs (default: 16)
    #[serde(rename = "sessionIDLength", alias = "sessionIdLength")]
    pub session_id_length: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SessionId".to_owned(),
            enable_set_cookie: true,
            gc_lifetime: 60 * 60,
            max_lifetime: 0,
            secure: false,
            cookie_lifetime: 0,
            provider_config: String::new(),
            domain: None,
            session_id_length: DEFAULT_ID_LENGTH,
        }
    }
}

impl ManagerConfig {
    /// Parse and validate the configuration from a JSON string
    pub fn from_json(json: &str) -> SessionResult<Self> {
        let config: ManagerConfig = serde_json::from_str(json)
            .map_err(|e| SessionError::Config(format!("malformed manager config: {e}")))?;
        config.validated()
    }

    /// Apply derived defaults and check the configuration for unusable values
    pub fn validated(mut self) -> SessionResult<Self> {
        if self.cookie_name.is_empty() {
            return Err(SessionError::Config("`cookieName` can't be empty".to_owned()));
        }
        if self.gc_lifetime == 0 {
            return Err(SessionError::Config("`gcLifetime` must be positive".to_owned()));
        }
        if self.session_id_length == 0 {
            return Err(SessionError::Config(
                "`sessionIDLength` must be positive".to_owned(),
            ));
        }
        if self.max_lifetime == 0 {
            self.max_lifetime = self.gc_lifetime;
        }
        if self.domain.as_deref() == Some("") {
            self.domain = None;
        }
        Ok(self)
    }
}
