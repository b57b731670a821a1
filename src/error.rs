//! Typed error hierarchy for the image request pipeline.
//!
//! Each layer returns its own error enum; [`ServerError`] is the single point
//! where a kind is mapped to an HTTP status and a user-visible message, per
//! the propagation policy: lower layers never guess at a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors raised while parsing an IIIF or DZI request string into a
/// [`crate::iiif::TransformSpec`].
#[derive(Debug, thiserror::Error)]
pub enum UrlGrammarError {
    #[error("malformed {segment}: {reason}")]
    MalformedSegment { segment: &'static str, reason: String },

    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("invalid percent-encoding in identifier")]
    InvalidEscaping,
}

/// Raised when a well-formed [`crate::iiif::TransformSpec`] asks for something
/// this server's [`crate::iiif::FeatureSet`] does not advertise.
#[derive(Debug, thiserror::Error)]
#[error("unsupported feature: {0}")]
pub struct UnsupportedFeatureError(pub String);

/// Errors from the decode planner (region/size resolution, constraint checks).
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("requested dimensions {width}x{height} (area {area}) exceed server limits")]
    DimensionsExceedLimits { width: u32, height: u32, area: u64 },

    #[error("source image has zero area")]
    EmptySource,
}

/// Errors from the [`crate::decoder::Decoder`] port.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Codec(String),

    #[error("requested region is out of bounds")]
    RegionOutOfBounds,
}

/// Errors from the [`crate::encoder`] module.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("encoding failed: {0}")]
    Codec(String),
}

/// Errors from the identifier→path resolver chain.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("identifier not resolvable to a file")]
    NotFound,

    #[error("resolver hook failed: {0}")]
    HookFailed(String),
}

/// Errors from loading and validating [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("prefix {a} overlaps with prefix {b}")]
    PrefixOverlap { a: &'static str, b: &'static str },
}

/// The top-level error type every HTTP handler converges on.
///
/// This is the sole point that maps an error kind to a status code, per
/// the error handling design: not-found is never logged as an error (it is
/// expected under normal operation), everything else is logged with the
/// identifier and resolved path when available.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Grammar(#[from] UrlGrammarError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeatureError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    DziTile(#[from] crate::dzi::DziTileError),

    #[error("request timed out")]
    Timeout,
}

impl ServerError {
    /// The IIIF/DZI error kind this error maps to, per the error handling design.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Grammar(_) => "malformed-request",
            ServerError::Unsupported(_) => "unsupported-feature",
            ServerError::Plan(PlanError::DimensionsExceedLimits { .. }) => {
                "dimensions-exceed-limits"
            }
            ServerError::Plan(PlanError::EmptySource) => "malformed-request",
            ServerError::Decode(_) => "decode-failure",
            ServerError::Encode(EncodeError::UnsupportedFormat(_)) => "malformed-request",
            ServerError::Encode(_) => "encode-failure",
            ServerError::Resolver(ResolverError::NotFound) => "not-found",
            ServerError::Resolver(_) => "decode-failure",
            ServerError::DziTile(_) => "malformed-request",
            ServerError::Timeout => "timeout",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            "malformed-request" => StatusCode::BAD_REQUEST,
            "not-found" => StatusCode::NOT_FOUND,
            "unsupported-feature" | "dimensions-exceed-limits" => StatusCode::NOT_IMPLEMENTED,
            "decode-failure" | "encode-failure" => StatusCode::INTERNAL_SERVER_ERROR,
            "timeout" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log at the level appropriate for this error's kind and context.
    pub fn log(&self, identifier: Option<&str>, path: Option<&str>) {
        let id = identifier.unwrap_or("-");
        let path = path.unwrap_or("-");
        if matches!(self, ServerError::Resolver(ResolverError::NotFound)) {
            tracing::debug!(identifier = id, "identifier not resolvable");
        } else {
            tracing::error!(identifier = id, path, error = %self, "request failed");
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
