//! Common error types used across all Lure services

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error_builder::{
    bad_request, conflict, forbidden, internal_server_error, not_found, service_unavailable,
    unauthorized,
};
use crate::problemdetails::Problem;

/// Common service error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Misconfigured: {message}")]
    Misconfigured { message: String },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A domain invariant was about to be broken. `forbidden` selects 403 over 400.
    #[error("Invariant violation: {message}")]
    Invariant { message: String, forbidden: bool },

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Database error: {0}")]
    Database(String),
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
            forbidden: false,
        }
    }

    pub fn forbidden_invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
            forbidden: true,
        }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// HTTP status this error is surfaced with at the handler boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Misconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Invariant { forbidden, .. } => {
                if *forbidden {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            Self::Upstream { .. } | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code included in problem responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Misconfigured { .. } => "MISCONFIGURED",
            Self::Unauthenticated { .. } => "UNAUTHENTICATED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Invariant { .. } => "INVARIANT_VIOLATION",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        ServiceError::Database(err.to_string())
    }
}

impl From<sea_orm::TransactionError<ServiceError>> for ServiceError {
    fn from(err: sea_orm::TransactionError<ServiceError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => e.into(),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

impl From<ServiceError> for Problem {
    fn from(err: ServiceError) -> Self {
        let code = err.error_code();
        let builder = match &err {
            ServiceError::Misconfigured { message } => {
                internal_server_error().title("Misconfigured").detail(message)
            }
            ServiceError::Unauthenticated { message } => unauthorized().detail(message),
            ServiceError::Forbidden { message } => forbidden().detail(message),
            ServiceError::NotFound { resource } => {
                not_found().detail(format!("{} not found", resource))
            }
            ServiceError::Conflict { message } => conflict().detail(message),
            ServiceError::Validation { message } => bad_request()
                .title("Validation Failed")
                .detail(message),
            ServiceError::Invariant { message, forbidden: true } => forbidden()
                .title("Invariant Violation")
                .detail(message),
            ServiceError::Invariant { message, .. } => bad_request()
                .title("Invariant Violation")
                .detail(message),
            ServiceError::Upstream { status, message } => internal_server_error()
                .title("Upstream Error")
                .detail(message)
                .value("upstream_status", status),
            ServiceError::UpstreamUnavailable { message } => service_unavailable().detail(message),
            // Storage details stay in the logs.
            ServiceError::Database(_) => internal_server_error(),
        };
        builder.value("error_code", code).build()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            ServiceError::Database(_) | ServiceError::Misconfigured { .. }
        ) {
            tracing::error!("{}", self);
        }
        Problem::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::misconfigured("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::unauthenticated("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ServiceError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ServiceError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::invariant("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::forbidden_invariant("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::upstream(502, "x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::upstream_unavailable("x").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_problem_carries_error_code() {
        let problem = Problem::from(ServiceError::conflict("domain already mapped"));
        assert_eq!(problem.status_code, StatusCode::CONFLICT);
        assert_eq!(problem.body["error_code"], "CONFLICT");
        assert_eq!(problem.body["detail"], "domain already mapped");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let problem = Problem::from(ServiceError::Database("relation missing".into()));
        assert_eq!(problem.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(problem.body["detail"], "relation missing");
        assert_eq!(problem.body["error_code"], "DATABASE_ERROR");
    }

    #[test]
    fn test_upstream_status_is_preserved() {
        let problem = Problem::from(ServiceError::upstream(502, "bad gateway"));
        assert_eq!(problem.body["upstream_status"], 502);
    }
}
