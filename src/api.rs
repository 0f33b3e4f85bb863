//! HTTP access to the Project K backend.
//!
//! `Transport` is the seam between the client core and the network: the
//! running application uses [`HttpTransport`], tests plug in a scripted one.
//! Every request built by `HttpTransport` passes through the shared
//! [`RequestGateway`] so it carries whichever token is configured at send time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::gateway::RequestGateway;
use crate::session::Role;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Text suitable for an inline form error.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or(fallback).to_string()
    }
}

/// Pull FastAPI's `detail` string out of an error body, if there is one.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("detail")?.as_str().map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    gateway: RequestGateway,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        gateway: RequestGateway,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            gateway,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = self.gateway.apply(builder);

        debug!(method = ?request.method, path = %request.path, "api request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterEndpoint {
    /// `/api/auth/register` with `user_type` in the body.
    #[default]
    Generic,
    /// `/api/auth/register/student` or `/api/auth/register/teacher`.
    RoleSpecific,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub role: Role,
    pub email: String,
    pub password: String,
    pub name: String,
    pub grade_level: Option<String>,
    pub school_name: Option<String>,
    pub endpoint: RegisterEndpoint,
}

impl Registration {
    pub fn to_request(&self) -> ApiRequest {
        let mut body = serde_json::json!({
            "email": self.email,
            "password": self.password,
            "name": self.name,
        });
        if let Some(grade) = &self.grade_level {
            body["grade_level"] = Value::from(grade.as_str());
        }
        if let Some(school) = &self.school_name {
            body["school_name"] = Value::from(school.as_str());
        }
        match self.endpoint {
            RegisterEndpoint::Generic => {
                body["user_type"] = Value::from(self.role.as_str());
                ApiRequest::post("/api/auth/register", body)
            }
            RegisterEndpoint::RoleSpecific => {
                ApiRequest::post(format!("/api/auth/register/{}", self.role.as_str()), body)
            }
        }
    }
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub access_token: String,
    pub user_type: String,
    pub user: Value,
}

/// Typed entry points over a shared transport.
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.transport.send(request).await
    }

    pub async fn login(&self, login: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let body = serde_json::to_value(login)?;
        let value = self.send(ApiRequest::post("/api/auth/login", body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let value = self.send(registration.to_request()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn dashboard(&self) -> Result<Value, ApiError> {
        self.send(ApiRequest::get("/api/dashboard")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_read_from_fastapi_errors() {
        assert_eq!(
            extract_detail(r#"{"detail":"Invalid email or password"}"#).as_deref(),
            Some("Invalid email or password")
        );
        // Validation errors carry a list, which is not shown to users.
        assert_eq!(extract_detail(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(extract_detail("<html>bad gateway</html>"), None);
    }

    #[test]
    fn user_message_falls_back_without_detail() {
        let err = ApiError::Status {
            status: 502,
            detail: None,
        };
        assert_eq!(err.user_message("Authentication failed"), "Authentication failed");
        let err = ApiError::Status {
            status: 400,
            detail: Some("Email already registered".into()),
        };
        assert_eq!(err.user_message("Registration failed"), "Email already registered");
    }

    #[test]
    fn registration_targets_the_chosen_endpoint() {
        let mut registration = Registration {
            role: Role::Student,
            email: "ana@example.com".into(),
            password: "pw".into(),
            name: "Ana".into(),
            grade_level: Some("9th".into()),
            school_name: None,
            endpoint: RegisterEndpoint::Generic,
        };
        let generic = registration.to_request();
        assert_eq!(generic.path, "/api/auth/register");
        assert_eq!(generic.body.as_ref().unwrap()["user_type"], "student");
        assert_eq!(generic.body.as_ref().unwrap()["grade_level"], "9th");

        registration.endpoint = RegisterEndpoint::RoleSpecific;
        let specific = registration.to_request();
        assert_eq!(specific.path, "/api/auth/register/student");
        assert!(specific.body.as_ref().unwrap().get("user_type").is_none());
    }

    #[test]
    fn auth_response_ignores_extra_fields() {
        let value = serde_json::json!({
            "access_token": "xyz",
            "token_type": "bearer",
            "user_type": "teacher",
            "user": {"name": "Mr. Obi"}
        });
        let parsed: AuthResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.access_token, "xyz");
        assert_eq!(parsed.user_type, "teacher");
    }
}
