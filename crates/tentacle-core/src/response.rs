//! Shared response head handed to policies

use crate::types::{header_lookup, header_name, header_snapshot, header_value};
use crate::{Error, Result};
use http::response::Parts;
use http::{HeaderMap, Response, StatusCode};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Response head owned by the gateway pipeline
///
/// Like [`GatewayRequest`](crate::GatewayRequest), clones share the same head.
#[derive(Clone)]
pub struct GatewayResponse {
    head: Arc<RwLock<Parts>>,
}

impl GatewayResponse {
    /// Wrap a response head
    pub fn new(parts: Parts) -> Self {
        Self {
            head: Arc::new(RwLock::new(parts)),
        }
    }

    /// Split an HTTP response into a shared head and its body
    pub fn from_response<B>(res: Response<B>) -> (Self, B) {
        let (parts, body) = res.into_parts();
        (Self::new(parts), body)
    }

    /// Placeholder head used before the upstream has answered
    pub fn pending() -> Self {
        Self::from_response(Response::new(())).0
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.head.read().status
    }

    /// Replace the HTTP status
    pub fn set_status(&self, code: i64) -> Result<()> {
        let status = u16::try_from(code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or(Error::InvalidStatus(code))?;
        self.head.write().status = status;
        Ok(())
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

    /// Rebuild an HTTP response from the current head
    pub fn to_response<B>(&self, body: B) -> Response<B> {
        Response::from_parts(self.head.read().clone(), body)
    }

    /// Whether two handles refer to the same head
    pub fn same_as(&self, other: &GatewayResponse) -> bool {
        Arc::ptr_eq(&self.head, &other.head)
    }
}

impl fmt::Debug for GatewayResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayResponse")
            .field("status", &self.head.read().status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_response() {
        let res = GatewayResponse::pending();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
    }

    #[test]
    fn test_set_status() {
        let res = GatewayResponse::pending();
        res.set_status(418).unwrap();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);

        assert!(matches!(res.set_status(42), Err(Error::InvalidStatus(42))));
        assert!(matches!(res.set_status(-1), Err(Error::InvalidStatus(-1))));
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn test_headers_shared_between_clones() {
        let res = GatewayResponse::pending();
        let handle = res.clone();
        handle.set_header("cache-control", "no-store").unwrap();

        assert_eq!(res.header("cache-control").as_deref(), Some("no-store"));
        assert_eq!(
            res.header_map().get("cache-control").map(String::as_str),
            Some("no-store")
        );
    }
}
