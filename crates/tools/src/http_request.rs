//! HTTP request tool — real requests via `reqwest`.
//!
//! GET/POST/PUT/PATCH/DELETE with optional headers and body. Responses are
//! reported as status line plus (truncated) body text.

use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolContext, ToolResult};
use nimbus_core::truncate_chars;
use std::time::Duration;
use tracing::debug;

const HTTP_TIMEOUT_SECS: u64 = 60;
const BODY_MAX_CHARS: usize = 8_000;

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Supports GET, POST, PUT, PATCH, and DELETE methods. \
         Returns the response status and body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to send the request to"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, PUT, PATCH, DELETE). Defaults to GET.",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"],
                    "default": "GET"
                },
                "headers": {
                    "type": "object",
                    "description": "Optional HTTP headers as key-value pairs",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body (for POST, PUT, PATCH)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let method = arguments["method"].as_str().unwrap_or("GET").to_uppercase();
        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Invalid HTTP method: {other}. Must be GET, POST, PUT, PATCH, or DELETE."
                )));
            }
        };

        if let Some(headers) = arguments["headers"].as_object() {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key, v);
                }
            }
        }

        if let Some(body) = arguments["body"].as_str() {
            request = request.body(body.to_string());
        }

        debug!(method = %method, url = %url, "Sending HTTP request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "http_request".into(),
                    timeout_secs: HTTP_TIMEOUT_SECS,
                }
            } else {
                ToolError::ExecutionFailed {
                    tool_name: "http_request".into(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(ToolResult {
            success: status.is_success(),
            output: format!(
                "Status: {}\n{}",
                status.as_u16(),
                truncate_chars(&body, BODY_MAX_CHARS)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = HttpRequestTool::new();
        assert_eq!(tool.name(), "http_request");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["url"]));
        assert!(schema["properties"]["method"].is_object());
        assert!(schema["properties"]["headers"].is_object());
    }

    #[tokio::test]
    async fn missing_url_returns_error() {
        let tool = HttpRequestTool::new();
        let result = tool.execute(&ToolContext::default(), serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn invalid_url_scheme_returns_error() {
        let tool = HttpRequestTool::new();
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({ "url": "ftp://files.example.com" }),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn invalid_method_returns_error() {
        let tool = HttpRequestTool::new();
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"url": "https://example.com", "method": "TRACE"}),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
