//! Fluent construction of RFC 7807 problem responses

use crate::problemdetails;
use axum::http::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

const PROBLEM_BASE: &str = "https://lure.sh/probs";

pub struct ErrorBuilder {
    status: StatusCode,
    type_: String,
    title: String,
    detail: Option<String>,
    instance: Option<String>,
    values: HashMap<String, serde_json::Value>,
}

impl ErrorBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            type_: String::new(),
            title: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            detail: None,
            instance: None,
            values: HashMap::new(),
        }
    }

    /// Sets the problem type from a slug under the Lure problem namespace.
    pub fn kind(self, slug: &str) -> Self {
        self.type_(format!("{}/{}", PROBLEM_BASE, slug))
    }

    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn value<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.values.insert(key.to_string(), value);
        }
        self
    }

    pub fn build(self) -> problemdetails::Problem {
        let mut problem = problemdetails::new(self.status)
            .with_type(self.type_)
            .with_title(self.title)
            .with_value("status", self.status.as_u16())
            .with_value("timestamp", chrono::Utc::now().to_rfc3339());

        if let Some(detail) = self.detail {
            problem = problem.with_detail(detail);
        }
        if let Some(instance) = self.instance {
            problem = problem.with_instance(instance);
        }
        for (key, value) in self.values {
            problem = problem.with_value(&key, value);
        }

        problem
    }
}

pub fn internal_server_error() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
        .kind("internal-server-error")
        .title("Internal Server Error")
        .detail("An unexpected error occurred while processing your request")
        .value("error_code", "INTERNAL_SERVER_ERROR")
}

pub fn not_found() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::NOT_FOUND)
        .kind("not-found")
        .title("Resource Not Found")
        .value("error_code", "NOT_FOUND")
}

pub fn unauthorized() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::UNAUTHORIZED)
        .kind("unauthorized")
        .title("Unauthorized")
        .detail("A valid bearer token is required to access this resource")
        .value("error_code", "UNAUTHENTICATED")
}

pub fn bad_request() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::BAD_REQUEST)
        .kind("bad-request")
        .title("Bad Request")
        .detail("The request was malformed or invalid")
}

pub fn forbidden() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::FORBIDDEN)
        .kind("forbidden")
        .title("Forbidden")
        .detail("You do not have permission to access this resource")
        .value("error_code", "FORBIDDEN")
}

pub fn conflict() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::CONFLICT)
        .kind("conflict")
        .title("Conflict")
        .detail("The request conflicts with the current state of the resource")
        .value("error_code", "CONFLICT")
}

pub fn service_unavailable() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::SERVICE_UNAVAILABLE)
        .kind("service-unavailable")
        .title("Service Unavailable")
        .detail("An upstream dependency could not be reached")
        .value("error_code", "UPSTREAM_UNAVAILABLE")
}
