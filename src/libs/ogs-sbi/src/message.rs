//! SBI Message Structures
//!
//! Request, response and problem-details structures exchanged over the
//! HTTP/2 Service Based Interface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PROBLEM_JSON: &str = "application/problem+json";
pub const CONTENT_TYPE_JSON_PATCH: &str = "application/json-patch+json";

const MAX_NUM_OF_RESOURCE_COMPONENT: usize = 8;

/// SBI Header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbiHeader {
    /// HTTP method (GET, POST, PUT, DELETE, PATCH, OPTIONS)
    pub method: String,
    /// Full URI
    pub uri: String,
    /// Service name
    pub service_name: Option<String>,
    /// API version
    pub api_version: Option<String>,
    /// Resource path components
    pub resource: Vec<String>,
}

impl SbiHeader {
    /// Create a new header with method and URI.
    ///
    /// `/{service}/{version}/{resource...}` paths are split so that
    /// `service_name`, `api_version` and `resource` are populated.
    pub fn with_method_uri(method: impl Into<String>, uri: impl Into<String>) -> Self {
        let mut header = Self {
            method: method.into(),
            uri: uri.into(),
            ..Default::default()
        };
        header.parse_uri();
        header
    }

    fn parse_uri(&mut self) {
        let path = match self.uri.find("://") {
            Some(scheme_end) => {
                let rest = &self.uri[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("")
            }
            None => self.uri.as_str(),
        };
        let path = path.split('?').next().unwrap_or("");

        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let service_name = parts.next().map(str::to_string);
        let api_version = parts.next().map(str::to_string);
        let resource: Vec<String> = parts.map(str::to_string).collect();

        self.service_name = service_name;
        self.api_version = api_version;
        self.resource.clear();
        for component in resource {
            self.add_resource(component);
        }
    }

    fn add_resource(&mut self, component: impl Into<String>) {
        if self.resource.len() < MAX_NUM_OF_RESOURCE_COMPONENT {
            self.resource.push(component.into());
        }
    }

    /// Build the resource path from components
    pub fn resource_path(&self) -> String {
        self.resource.join("/")
    }
}

/// SBI HTTP Message
///
/// Header names are stored lower-cased, so lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct SbiHttpMessage {
    /// Query parameters
    pub params: HashMap<String, String>,
    /// HTTP headers
    pub headers: HashMap<String, String>,
    /// Body content
    pub content: Option<String>,
}

impl SbiHttpMessage {
    /// Set a query parameter
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Set a header
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Get a header
    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers.get(&key.to_ascii_lowercase())
    }

    /// Set the body content
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = Some(content.into());
    }
}

/// SBI Request
#[derive(Debug, Clone, Default)]
pub struct SbiRequest {
    /// Request header
    pub header: SbiHeader,
    /// HTTP message (params, headers, body)
    pub http: SbiHttpMessage,
}

impl SbiRequest {
    fn with_method(method: &str, uri: impl Into<String>) -> Self {
        Self {
            header: SbiHeader::with_method_uri(method, uri),
            http: SbiHttpMessage::default(),
        }
    }

    /// Create a GET request
    pub fn get(uri: impl Into<String>) -> Self {
        Self::with_method("GET", uri)
    }

    /// Create a POST request
    pub fn post(uri: impl Into<String>) -> Self {
        Self::with_method("POST", uri)
    }

    /// Create a PUT request
    pub fn put(uri: impl Into<String>) -> Self {
        Self::with_method("PUT", uri)
    }

    /// Create a PATCH request
    pub fn patch(uri: impl Into<String>) -> Self {
        Self::with_method("PATCH", uri)
    }

    /// Set JSON body content
    pub fn with_json_body<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(body)?;
        Ok(self.with_body(json, CONTENT_TYPE_JSON))
    }

    /// Set raw body content
    pub fn with_body(mut self, content: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.http.set_content(content);
        self.http.set_header("Content-Type", content_type);
        self
    }

    /// Add a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.set_param(key, value);
        self
    }

    /// Parse JSON body, `None` when the request carries no content
    pub fn json_body<T: for<'de> Deserialize<'de>>(&self) -> Option<Result<T, serde_json::Error>> {
        self.http.content.as_deref().map(serde_json::from_str)
    }
}

/// SBI Response
#[derive(Debug, Clone, Default)]
pub struct SbiResponse {
    /// HTTP message (params, headers, body)
    pub http: SbiHttpMessage,
    /// HTTP status code
    pub status: u16,
}

impl SbiResponse {
    /// Create a response with status code
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Create a successful response (200 OK)
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// Create a created response (201 Created)
    pub fn created() -> Self {
        Self::with_status(201)
    }

    /// Create a no content response (204 No Content)
    pub fn no_content() -> Self {
        Self::with_status(204)
    }

    /// Set JSON body content
    pub fn with_json_body<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(body)?;
        Ok(self.with_body(json, CONTENT_TYPE_JSON))
    }

    /// Set raw body content
    pub fn with_body(mut self, content: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.http.set_content(content);
        self.http.set_header("Content-Type", content_type);
        self
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.set_header(key, value);
        self
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse JSON body
    pub fn json_body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        let content = self.http.content.as_deref().unwrap_or("{}");
        serde_json::from_str(content)
    }
}

/// Problem Details - RFC 7807 compliant error response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    /// A short, human-readable summary of the problem type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The HTTP status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    /// A human-readable explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Application-specific error cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProblemDetails {
    pub fn with_status(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
