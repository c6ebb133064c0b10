//! Configuration for the document storage adapter.
//!
//! [`DocumentStoreConfig`] resolves the connection parameters (scheme, host,
//! credentials, bucket and collection names) and carries the
//! [`ConnectionRetryConfig`] that bounds startup retries.

use std::time::Duration;

use authstore_storage::{ConnectionSettings, Zeroizing};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocumentStorageError, Result};

/// Default time to keep retrying an unreachable database at startup (1 hour).
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600);

/// Default pause between startup connection attempts (10 seconds).
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default bucket readiness wait (10 seconds).
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Scheme used when the connection URI does not name one.
pub const DEFAULT_SCHEME: &str = "couchbase";

/// Host used when the connection URI does not name one.
pub const DEFAULT_HOST: &str = "localhost";

/// User name used when none is configured.
pub const DEFAULT_USER: &str = "Administrator";

/// Password used when none is configured.
pub const DEFAULT_PASSWORD: &str = "password";

/// Bucket used when none is configured.
pub const DEFAULT_BUCKET_NAME: &str = "supertokens";

const KEY_VALUE_COLLECTION: &str = "key_value";
const SESSION_INFO_COLLECTION: &str = "session_info";
const JWT_SIGNING_KEYS_COLLECTION: &str = "jwt_signing_keys";

const VALID_FIELDS: &[&str] = &[
    "config_version",
    "connection_uri",
    "user",
    "password",
    "bucket_name",
    "key_value_collection_name",
    "session_info_collection_name",
    "collection_names_prefix",
    "retry",
];

/// Timing of the startup connection loop.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use authstore_storage_document::ConnectionRetryConfig;
///
/// let retry = ConnectionRetryConfig::builder()
///     .max_wait(Duration::from_secs(60))
///     .retry_interval(Duration::from_secs(2))
///     .build()?;
/// assert_eq!(retry.readiness_timeout(), Duration::from_secs(10));
/// # Ok::<(), authstore_storage_document::DocumentStorageError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionRetryConfig {
    /// How long to keep retrying while the database refuses connections.
    #[serde(with = "humantime_serde", default = "default_max_wait")]
    pub(crate) max_wait: Duration,

    /// Pause between attempts.
    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub(crate) retry_interval: Duration,

    /// Bound on each bucket readiness wait.
    #[serde(with = "humantime_serde", default = "default_readiness_timeout")]
    pub(crate) readiness_timeout: Duration,
}

fn default_max_wait() -> Duration {
    DEFAULT_MAX_WAIT
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

fn default_readiness_timeout() -> Duration {
    DEFAULT_READINESS_TIMEOUT
}

impl Default for ConnectionRetryConfig {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

#[bon::bon]
impl ConnectionRetryConfig {
    /// Creates a retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStorageError::Config`] if any duration is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_WAIT)] max_wait: Duration,
        #[builder(default = DEFAULT_RETRY_INTERVAL)] retry_interval: Duration,
        #[builder(default = DEFAULT_READINESS_TIMEOUT)] readiness_timeout: Duration,
    ) -> Result<Self> {
        let config = Self { max_wait, retry_interval, readiness_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Returns how long startup keeps retrying.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Returns the bucket readiness bound.
    #[must_use]
    pub fn readiness_timeout(&self) -> Duration {
        self.readiness_timeout
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_wait", self.max_wait),
            ("retry_interval", self.retry_interval),
            ("readiness_timeout", self.readiness_timeout),
        ] {
            if value.is_zero() {
                return Err(DocumentStorageError::Config(format!("'{name}' must be non-zero")));
            }
        }
        Ok(())
    }
}

/// Connection and naming configuration of the document store.
///
/// Unknown fields are ignored so the adapter can read its section out of a
/// shared configuration file.
///
/// # Example
///
/// ```
/// use authstore_storage_document::DocumentStoreConfig;
///
/// let config = DocumentStoreConfig::builder()
///     .connection_uri("couchbase://db.internal:8091")
///     .collection_names_prefix("auth")
///     .build()?;
///
/// assert_eq!(config.host_name(), "db.internal");
/// assert_eq!(config.jwt_signing_keys_collection(), "auth_jwt_signing_keys");
/// # Ok::<(), authstore_storage_document::DocumentStorageError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Version marker of the configuration section.
    #[serde(default = "default_config_version")]
    pub(crate) config_version: i32,

    /// Connection URI, `scheme://host[:port]`.
    #[serde(default)]
    pub(crate) connection_uri: Option<String>,

    /// User name.
    #[serde(default)]
    pub(crate) user: Option<String>,

    /// Password.
    #[serde(default, skip_serializing)]
    pub(crate) password: Option<String>,

    /// Bucket name.
    #[serde(default)]
    pub(crate) bucket_name: Option<String>,

    /// Explicit name of the key-value collection.
    #[serde(default)]
    pub(crate) key_value_collection_name: Option<String>,

    /// Explicit name of the session-info collection.
    #[serde(default)]
    pub(crate) session_info_collection_name: Option<String>,

    /// Prefix applied to derived collection names.
    #[serde(default)]
    pub(crate) collection_names_prefix: String,

    /// Startup retry timing.
    #[serde(default)]
    pub(crate) retry: ConnectionRetryConfig,
}

fn default_config_version() -> i32 {
    -1
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            connection_uri: None,
            user: None,
            password: None,
            bucket_name: None,
            key_value_collection_name: None,
            session_info_collection_name: None,
            collection_names_prefix: String::new(),
            retry: ConnectionRetryConfig::default(),
        }
    }
}

#[bon::bon]
impl DocumentStoreConfig {
    /// Creates a configuration and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStorageError::Config`] if the connection URI cannot
    /// be parsed.
    #[builder]
    pub fn new(
        #[builder(into)] connection_uri: String,
        #[builder(into)] user: Option<String>,
        #[builder(into)] password: Option<String>,
        #[builder(into)] bucket_name: Option<String>,
        #[builder(into)] key_value_collection_name: Option<String>,
        #[builder(into)] session_info_collection_name: Option<String>,
        #[builder(into, default)] collection_names_prefix: String,
        #[builder(default)] retry: ConnectionRetryConfig,
    ) -> Result<Self> {
        let config = Self {
            config_version: default_config_version(),
            connection_uri: Some(connection_uri),
            user,
            password,
            bucket_name,
            key_value_collection_name,
            session_info_collection_name,
            collection_names_prefix,
            retry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration keys this adapter recognises.
    #[must_use]
    pub fn valid_fields() -> &'static [&'static str] {
        VALID_FIELDS
    }

    /// Checks that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStorageError::Config`] if `connection_uri` is unset
    /// or malformed, or if the retry timing is invalid.
    pub fn validate(&self) -> Result<()> {
        let Some(uri) = self.connection_uri.as_deref() else {
            return Err(DocumentStorageError::Config(
                "'connection_uri' is not set in the config file. Please set this value and \
                 restart"
                    .into(),
            ));
        };
        parse_connection_uri(uri)?;
        self.retry.validate()
    }

    fn parsed_uri(&self) -> Option<Url> {
        self.connection_uri.as_deref().and_then(|uri| parse_connection_uri(uri).ok())
    }

    /// Returns the raw connection URI.
    #[must_use]
    pub fn connection_uri(&self) -> Option<&str> {
        self.connection_uri.as_deref()
    }

    /// Returns the connection scheme, defaulting to `couchbase`.
    #[must_use]
    pub fn connection_scheme(&self) -> String {
        self.parsed_uri()
            .map_or_else(|| DEFAULT_SCHEME.to_owned(), |url| url.scheme().to_owned())
    }

    /// Returns the host name, defaulting to `localhost`.
    #[must_use]
    pub fn host_name(&self) -> String {
        self.parsed_uri()
            .and_then(|url| url.host_str().filter(|host| !host.is_empty()).map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_HOST.to_owned())
    }

    /// Returns the explicit port, if the URI has one.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.parsed_uri().and_then(|url| url.port())
    }

    /// Returns the user name, defaulting to `Administrator` when unset or empty.
    #[must_use]
    pub fn user(&self) -> &str {
        non_empty(self.user.as_deref()).unwrap_or(DEFAULT_USER)
    }

    /// Returns the password, defaulting to `password` when unset or empty.
    #[must_use]
    pub fn password(&self) -> &str {
        non_empty(self.password.as_deref()).unwrap_or(DEFAULT_PASSWORD)
    }

    /// Returns the bucket name, defaulting to `supertokens`.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or(DEFAULT_BUCKET_NAME)
    }

    /// Returns the key-value collection name.
    #[must_use]
    pub fn key_value_collection(&self) -> String {
        self.key_value_collection_name
            .clone()
            .unwrap_or_else(|| self.prefixed(KEY_VALUE_COLLECTION))
    }

    /// Returns the session-info collection name.
    #[must_use]
    pub fn session_info_collection(&self) -> String {
        self.session_info_collection_name
            .clone()
            .unwrap_or_else(|| self.prefixed(SESSION_INFO_COLLECTION))
    }

    /// Returns the JWT signing-key collection name.
    #[must_use]
    pub fn jwt_signing_keys_collection(&self) -> String {
        self.prefixed(JWT_SIGNING_KEYS_COLLECTION)
    }

    /// Returns the startup retry timing.
    #[must_use]
    pub fn retry(&self) -> &ConnectionRetryConfig {
        &self.retry
    }

    /// Builds the driver connection settings.
    ///
    /// The port is deliberately left out; the driver discovers service ports
    /// from the cluster map.
    pub(crate) fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connection_string: format!("{}://{}", self.connection_scheme(), self.host_name()),
            user: self.user().to_owned(),
            password: Zeroizing::new(self.password().to_owned()),
        }
    }

    fn prefixed(&self, name: &str) -> String {
        let prefix = self.collection_names_prefix.trim();
        if prefix.is_empty() { name.to_owned() } else { format!("{prefix}_{name}") }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Parses a connection URI.
///
/// A value without `://` is a bare `host[:port]`; it gets the default scheme
/// instead of having its host mistaken for a scheme.
fn parse_connection_uri(uri: &str) -> Result<Url> {
    let parsed = if uri.contains("://") {
        Url::parse(uri)
    } else {
        Url::parse(&format!("{DEFAULT_SCHEME}://{uri}"))
    };
    parsed.map_err(|_| invalid_uri())
}

fn invalid_uri() -> DocumentStorageError {
    DocumentStorageError::Config(
        "The provided connection URI has an incorrect format. Please use a format like \
         couchbase://[user[:[password]]@]host[:port]"
            .into(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(uri: &str) -> DocumentStoreConfig {
        DocumentStoreConfig::builder().connection_uri(uri).build().expect("valid config")
    }

    #[test]
    fn test_defaults() {
        let config = config("couchbase://localhost");

        assert_eq!(config.connection_scheme(), "couchbase");
        assert_eq!(config.host_name(), "localhost");
        assert_eq!(config.port(), None);
        assert_eq!(config.user(), "Administrator");
        assert_eq!(config.password(), "password");
        assert_eq!(config.bucket_name(), "supertokens");
        assert_eq!(config.key_value_collection(), "key_value");
        assert_eq!(config.session_info_collection(), "session_info");
        assert_eq!(config.jwt_signing_keys_collection(), "jwt_signing_keys");
        assert_eq!(config.retry(), &ConnectionRetryConfig::default());
    }

    #[test]
    fn test_scheme_host_and_port_from_uri() {
        let config = config("couchbases://db.example.com:18091");

        assert_eq!(config.connection_scheme(), "couchbases");
        assert_eq!(config.host_name(), "db.example.com");
        assert_eq!(config.port(), Some(18091));
        assert_eq!(config.connection_settings().connection_string, "couchbases://db.example.com");
    }

    #[test]
    fn test_host_and_port_without_scheme() {
        let config = config("db.example.com:8091");

        assert_eq!(config.host_name(), "db.example.com");
        assert_eq!(config.port(), Some(8091));
        assert_eq!(config.connection_scheme(), "couchbase");
    }

    #[test]
    fn test_bare_host_gets_default_scheme() {
        let config = config("db.example.com");

        assert_eq!(config.host_name(), "db.example.com");
        assert_eq!(config.connection_scheme(), "couchbase");
    }

    #[test]
    fn test_empty_credentials_use_defaults() {
        let config = DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .user("")
            .password("")
            .build()
            .unwrap();

        assert_eq!(config.user(), "Administrator");
        assert_eq!(config.password(), "password");
    }

    #[test]
    fn test_explicit_credentials() {
        let config = DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .user("auth")
            .password("hunter2")
            .build()
            .unwrap();

        let settings = config.connection_settings();
        assert_eq!(settings.user, "auth");
        assert_eq!(settings.password.as_str(), "hunter2");
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_prefix_applies_to_derived_names_only() {
        let config = DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .collection_names_prefix("  tenant ")
            .session_info_collection_name("sessions")
            .build()
            .unwrap();

        assert_eq!(config.key_value_collection(), "tenant_key_value");
        assert_eq!(config.session_info_collection(), "sessions");
        assert_eq!(config.jwt_signing_keys_collection(), "tenant_jwt_signing_keys");
    }

    #[test]
    fn test_blank_prefix_is_ignored() {
        let config = DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .collection_names_prefix("   ")
            .build()
            .unwrap();

        assert_eq!(config.jwt_signing_keys_collection(), "jwt_signing_keys");
    }

    #[test]
    fn test_missing_uri_fails_validation() {
        let config = DocumentStoreConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'connection_uri' is not set"), "{err}");
    }

    #[test]
    fn test_malformed_uri_fails_validation() {
        let result = DocumentStoreConfig::builder().connection_uri("couchbase://[::1").build();
        assert!(matches!(result, Err(DocumentStorageError::Config(_))));
    }

    #[test]
    fn test_deserialization_with_defaults_and_unknown_fields() {
        let json = r#"{
            "connection_uri": "couchbase://db:8091",
            "bucket_name": "auth",
            "core_config_version": 3
        }"#;

        let config: DocumentStoreConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.bucket_name(), "auth");
        assert_eq!(config.config_version, -1);
        assert_eq!(config.retry().max_wait(), DEFAULT_MAX_WAIT);
        assert_eq!(config.retry().retry_interval(), DEFAULT_RETRY_INTERVAL);
    }

    #[test]
    fn test_deserialization_of_retry_durations() {
        let json = r#"{
            "connection_uri": "couchbase://db",
            "retry": { "max_wait": "5m", "retry_interval": "500ms" }
        }"#;

        let config: DocumentStoreConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.retry().max_wait(), Duration::from_secs(300));
        assert_eq!(config.retry().retry_interval(), Duration::from_millis(500));
        assert_eq!(config.retry().readiness_timeout(), DEFAULT_READINESS_TIMEOUT);
    }

    #[test]
    fn test_retry_builder_rejects_zero_durations() {
        let result = ConnectionRetryConfig::builder().retry_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(DocumentStorageError::Config(ref m)) if m.contains("retry_interval")));
    }

    #[test]
    fn test_retry_builder_defaults_match_default_impl() {
        let built = ConnectionRetryConfig::builder().build().unwrap();
        assert_eq!(built, ConnectionRetryConfig::default());
    }

    #[test]
    fn test_valid_fields_cover_serialized_keys() {
        let serialized = serde_json::to_value(config("couchbase://localhost")).unwrap();
        let object = serialized.as_object().unwrap();
        for key in object.keys() {
            assert!(DocumentStoreConfig::valid_fields().contains(&key.as_str()), "{key}");
        }
    }
}
