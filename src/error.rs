//! Error types for the box_catalog crate.

use thiserror::Error;

/// Errors raised while loading credentials and endpoints.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    MissingValue(&'static str),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFile(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParse(#[from] serde_json::Error),
}

/// Errors from the authorization-code flow.
///
/// All of these are terminal for the code that produced them; the caller has
/// to send the user through the authorize URL again.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authorization code is empty")]
    EmptyCode,

    #[error("Token exchange failed ({status_code}): {provider_message}")]
    TokenExchangeFailed {
        status_code: u16,
        provider_message: String,
    },

    #[error("Token endpoint answered without an access_token")]
    MissingAccessToken,

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("Redirect URL carries no authorization code: {0}")]
    InvalidRedirect(String),

    #[error("Invalid authorize endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors from bearer-authenticated API calls.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed with status {status_code}")]
    RequestFailed { status_code: u16, url: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: {detail}")]
    UnexpectedResponse { url: String, detail: &'static str },

    #[error("Failed to write downloaded content: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::RequestFailed { status_code, .. } => Some(*status_code),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            FetchError::UnexpectedResponse { .. } | FetchError::Io(_) => None,
        }
    }
}

/// Errors from mirroring a catalog into the remote database file.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Searching for the remote database failed: {0}")]
    Search(#[source] FetchError),

    #[error("Downloading the remote database failed: {0}")]
    Download(#[source] FetchError),

    #[error("Uploading the database failed: {0}")]
    Upload(#[source] FetchError),

    #[error("Upload response did not describe a file")]
    UnexpectedUploadResponse,

    #[error("Local database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any error the library can produce.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type alias for Error.
pub type Result<T> = std::result::Result<T, Error>;
