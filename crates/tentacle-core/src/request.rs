//! Shared request head handed to policies

use crate::types::{header_lookup, header_name, header_snapshot, header_value};
use crate::Result;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Request head owned by the gateway pipeline
///
/// Cloning yields another handle to the same head, so header changes made by one
/// policy are visible to every later stage of the pipeline.
#[derive(Clone)]
pub struct GatewayRequest {
    id: Arc<str>,
    head: Arc<RwLock<Parts>>,
}

impl GatewayRequest {
    /// Wrap a request head
    pub fn new(parts: Parts) -> Self {
        Self {
            id: Uuid::new_v4().to_string().into(),
            head: Arc::new(RwLock::new(parts)),
        }
    }

    /// Split an HTTP request into a shared head and its body
    pub fn from_request<B>(req: Request<B>) -> (Self, B) {
        let (parts, body) = req.into_parts();
        (Self::new(parts), body)
    }

    /// Unique request ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HTTP method
    pub fn method(&self) -> Method {
        self.head.read().method.clone()
    }

    /// Full request URI
    pub fn uri(&self) -> Uri {
        self.head.read().uri.clone()
    }

    /// URI path
    pub fn path(&self) -> String {
        self.head.read().uri.path().to_string()
    }

    /// Raw query string, if any
    pub fn query(&self) -> Option<String> {
        self.head.read().uri.query().map(str::to_string)
    }

    /// HTTP version
    pub fn version(&self) -> Version {
        self.head.read().version
    }

    /// Copy of the current headers
    pub fn headers(&self) -> HeaderMap {
        self.head.read().headers.clone()
    }

    /// Headers flattened to a name -> value map
    pub fn header_map(&self) -> BTreeMap<String, String> {
        header_snapshot(&self.head.read().headers)
    }

    /// First value of a header, if present and printable
    pub fn header(&self, name: &str) -> Option<String> {
        header_lookup(&self.head.read().headers, name)
    }

    /// Replace a header value
    pub fn set_header(&self, name: &str, value: &str) -> Result<()> {
        let header = header_name(name)?;
        let value = header_value(name, value)?;
        self.head.write().headers.insert(header, value);
        Ok(())
    }

    /// Remove a header, returning its previous value
    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.head
            .write()
            .headers
            .remove(name)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Run a closure with mutable access to the head
    pub fn with_parts<R>(&self, f: impl FnOnce(&mut Parts) -> R) -> R {
        f(&mut self.head.write())
    }

    /// Rebuild an HTTP request from the current head
    pub fn to_request<B>(&self, body: B) -> Request<B> {
        Request::from_parts(self.head.read().clone(), body)
    }

    /// Whether two handles refer to the same head
    pub fn same_as(&self, other: &GatewayRequest) -> bool {
        Arc::ptr_eq(&self.head, &other.head)
    }
}

impl fmt::Debug for GatewayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head.read();
        f.debug_struct("GatewayRequest")
            .field("id", &self.id)
            .field("method", &head.method)
            .field("uri", &head.uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GatewayRequest {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/orders?limit=10")
            .header("content-type", "application/json")
            .body(())
            .unwrap();
        GatewayRequest::from_request(req).0
    }

    #[test]
    fn test_request_accessors() {
        let req = request();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/api/orders");
        assert_eq!(req.query().as_deref(), Some("limit=10"));
        assert_eq!(req.header("content-type").as_deref(), Some("application/json"));
        assert!(!req.id().is_empty());
    }

    #[test]
    fn test_clone_shares_head() {
        let req = request();
        let handle = req.clone();

        handle.set_header("x-trace", "abc").unwrap();
        assert_eq!(req.header("x-trace").as_deref(), Some("abc"));
        assert!(req.same_as(&handle));

        assert_eq!(req.remove_header("x-trace").as_deref(), Some("abc"));
        assert_eq!(handle.header("x-trace"), None);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let req = request();
        assert!(req.set_header("bad header", "x").is_err());
        assert!(req.set_header("x-ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_to_request_carries_changes() {
        let req = request();
        req.set_header("x-policy", "applied").unwrap();

        let rebuilt = req.to_request("body");
        assert_eq!(rebuilt.headers()["x-policy"], "applied");
        assert_eq!(*rebuilt.body(), "body");
    }
}
