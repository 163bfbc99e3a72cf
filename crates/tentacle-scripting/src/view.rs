//! Content-aware views exposed to scripts

use tentacle_core::{GatewayRequest, GatewayResponse};

/// Request as seen by a script
///
/// Everything except the body is delegated to the wrapped request, so header
/// changes land directly on the gateway's request head. `content` is only set
/// for the request body hook; `None` means the hook does not see the body, which
/// scripts can tell apart from an empty body.
#[derive(Debug, Clone)]
pub struct RequestView {
    request: GatewayRequest,
    content: Option<String>,
}

impl RequestView {
    /// View without body content
    pub fn new(request: &GatewayRequest) -> Self {
        Self {
            request: request.clone(),
            content: None,
        }
    }

    /// View carrying the request body
    pub fn with_content(request: &GatewayRequest, content: impl Into<String>) -> Self {
        Self {
            request: request.clone(),
            content: Some(content.into()),
        }
    }

    /// Wrapped request
    pub fn request(&self) -> &GatewayRequest {
        &self.request
    }

    /// Body snapshot, if the hook sees the body
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Response as seen by a script
#[derive(Debug, Clone)]
pub struct ResponseView {
    response: GatewayResponse,
    content: Option<String>,
}

impl ResponseView {
    /// View without body content
    pub fn new(response: &GatewayResponse) -> Self {
        Self {
            response: response.clone(),
            content: None,
        }
    }

    /// View carrying the response body
    pub fn with_content(response: &GatewayResponse, content: impl Into<String>) -> Self {
        Self {
            response: response.clone(),
            content: Some(content.into()),
        }
    }

    /// Wrapped response
    pub fn response(&self) -> &GatewayResponse {
        &self.response
    }

    /// Body snapshot, if the hook sees the body
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_content_differ() {
        let (req, _) = GatewayRequest::from_request(http::Request::new(()));
        assert_eq!(RequestView::new(&req).content(), None);
        assert_eq!(RequestView::with_content(&req, "").content(), Some(""));
    }

    #[test]
    fn test_view_delegates_to_wrapped_response() {
        let res = GatewayResponse::pending();
        let view = ResponseView::with_content(&res, "{}");
        view.response().set_header("x-view", "1").unwrap();

        assert_eq!(res.header("x-view").as_deref(), Some("1"));
        assert_eq!(view.content(), Some("{}"));
    }
}
