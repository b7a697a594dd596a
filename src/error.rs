//! Error types for the alert pipeline.
//!
//! Only `ConfigError` is fatal for a run. `FetchError`s are logged and
//! degrade to "no data for this query"; `NotifyError`s are logged and turn
//! into a non-zero exit code after the message was built.

/// Errors raised while loading credentials or the TOML configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("missing required environment variable {0}")]
    MissingCredential(&'static str),

    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// The file parsed but contains values the pipeline cannot use.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can arise when fetching or unwrapping data.go.kr responses.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Non-2xx HTTP response from the API.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body could not be deserialized, or the envelope is missing
    /// `response.body.items`.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The envelope carried a result code other than "00".
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The request succeeded but returned no items.
    #[error("No data returned for {0}")]
    NoData(String),

    /// A concurrent fetch thread panicked before returning a result.
    #[error("fetch worker for {0} panicked")]
    WorkerPanicked(String),
}

/// Errors raised while delivering the formatted message.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The messaging API answered with a non-success status.
    #[error("API error from {service}: status={status}, body={body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Anything that ends a run early.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl RunError {
    /// Process exit code: 1 for configuration problems, 2 for delivery.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 1,
            RunError::Notify(_) => 2,
        }
    }
}
