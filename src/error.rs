use std::io::Error as IO_ERROR;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

use crate::types::MetricName;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("{0}")]
    ReqwestError(#[from] REQWEST_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Server end with error: {0}")]
    ServerError(String),

    #[error("Invalid option {option}")]
    InvalidOption { option: String },

    #[error("Invalid timestamp {name}: '{value}' is not a number")]
    InvalidTimestamp { name: String, value: String },

    #[error("Invalid range: startTimestamp {start} is after endTimestamp {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("Invalid scope '{0}'")]
    InvalidScope(String),

    #[error("Missing params: {0}")]
    MissingParams(String),

    #[error("Invalid metrics: {}", .0.join(", "))]
    InvalidMetrics(Vec<String>),

    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    #[error("No RPC endpoint configured for chain {0}")]
    RpcNotConfigured(String),

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Upstream responded with status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Invalid hex quantity: {0}")]
    ParseHex(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidOption { .. }
            | Error::InvalidTimestamp { .. }
            | Error::InvalidRange { .. }
            | Error::MissingParams(_)
            | Error::InvalidMetrics(_)
            | Error::InvalidScope(_)
            | Error::RpcNotConfigured(_) => StatusCode::BAD_REQUEST,

            Error::ChainNotFound(_) => StatusCode::NOT_FOUND,

            Error::ReqwestError(_)
            | Error::RpcError { .. }
            | Error::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,

            Error::Io(_)
            | Error::URL(_)
            | Error::TokioJoinError(_)
            | Error::JsonError(_)
            | Error::SetGlobalDefaultError(_)
            | Error::ConfigurationError(_)
            | Error::ServerError(_)
            | Error::ParseHex(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        if let Error::InvalidMetrics(invalid) = self {
            body["invalidMetrics"] = serde_json::json!(invalid);
            body["validMetrics"] = serde_json::json!(MetricName::tokens());
        }

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = Error::InvalidRange { start: 10, end: 5 };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::InvalidMetrics(vec![String::from("foo")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid metrics: foo");

        let err = Error::InvalidScope(String::from(".."));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_and_lookup_statuses() {
        assert_eq!(
            Error::ChainNotFound(String::from("1")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::RpcError {
                code: -32000,
                message: String::from("header not found"),
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::ServerError(String::from("empty result")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
