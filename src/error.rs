use std::path::PathBuf;

use thiserror::Error;

/// Bad command-line or config-file input. Reported before any network call.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot use port {port} with url {url}")]
    InvalidPort { url: String, port: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Failure of one pipeline call. Rendered to the user as [`RequestError::SENTINEL`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("authentication failed: {reason}")]
    Authentication { status: Option<u16>, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("request returned HTTP status {status}")]
    HttpStatus { status: u16, body: String },

    #[error("failed to parse response body as JSON: {0}")]
    JsonParse(#[source] serde_json::Error),
}

impl RequestError {
    pub const SENTINEL: &'static str = "ERROR";
}

/// CSV to bulk payload conversion failure.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("no csv file configured")]
    MissingCsv,

    #[error("failed to open csv file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv file {} has no header line", .path.display())]
    MissingHeader { path: PathBuf },

    #[error("failed to serialize bulk payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("response does not contain an 'entities' array")]
    MissingEntities,

    #[error("output folder is not configured")]
    MissingFolder,

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
