//! Body stream transformation
//!
//! The streaming layer buffers a body as it arrives and hands it to a
//! [`BodyTransformer`] once the stream ends. The transformer either returns a
//! replacement body or reports that it already failed the chain.

use crate::{BodySide, GatewayRequest, GatewayResponse};
use bytes::{Bytes, BytesMut};
use http::header;
use std::fmt;
use tracing::trace;

/// Fatal error raised while transforming a body
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransformationError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransformationError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping its cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What a transformer produced for a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Replace the body with these bytes
    Emit(Bytes),
    /// Nothing to emit; the chain has been told the stream failed
    Failed,
}

/// Whole-body transformation applied at the end of a stream
pub trait BodyTransformer: Send + Sync + fmt::Debug {
    /// Transform the buffered body
    fn transform(&self, content: Bytes) -> Result<ChunkOutcome, TransformationError>;
}

enum Target {
    Request(GatewayRequest),
    Response(GatewayResponse),
}

/// Buffering stream that runs a [`BodyTransformer`] once over the full body
pub struct TransformableStream {
    target: Target,
    buffer: Option<BytesMut>,
    transformer: Box<dyn BodyTransformer>,
}

impl TransformableStream {
    /// Stream transforming a request body
    pub fn on_request(request: &GatewayRequest, transformer: impl BodyTransformer + 'static) -> Self {
        Self {
            target: Target::Request(request.clone()),
            buffer: None,
            transformer: Box::new(transformer),
        }
    }

    /// Stream transforming a response body
    pub fn on_response(
        response: &GatewayResponse,
        transformer: impl BodyTransformer + 'static,
    ) -> Self {
        Self {
            target: Target::Response(response.clone()),
            buffer: None,
            transformer: Box::new(transformer),
        }
    }

    /// Side of the exchange this stream transforms
    pub fn side(&self) -> BodySide {
        match self.target {
            Target::Request(_) => BodySide::Request,
            Target::Response(_) => BodySide::Response,
        }
    }

    /// Buffer a chunk
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        let chunk = chunk.as_ref();
        trace!(side = %self.side(), len = chunk.len(), "Buffering body chunk");
        self.buffer
            .get_or_insert_with(BytesMut::new)
            .extend_from_slice(chunk);
    }

    /// End the stream and run the transformer
    ///
    /// The transformer runs even when no chunk was written, over an empty body.
    /// Returns the replacement body, or `None` when the transformer failed the
    /// chain.
    pub fn end(mut self) -> Result<Option<Bytes>, TransformationError> {
        let buffer = self.buffer.take().unwrap_or_default();
        trace!(side = %self.side(), len = buffer.len(), "Transforming body");

        match self.transformer.transform(buffer.freeze())? {
            ChunkOutcome::Emit(body) => {
                self.update_length(body.len());
                Ok(Some(body))
            }
            ChunkOutcome::Failed => Ok(None),
        }
    }

    fn update_length(&self, len: usize) {
        let value = header::HeaderValue::from(len);
        match &self.target {
            Target::Request(request) => request.with_parts(|parts| {
                parts.headers.remove(header::TRANSFER_ENCODING);
                parts.headers.insert(header::CONTENT_LENGTH, value);
            }),
            Target::Response(response) => response.with_parts(|parts| {
                parts.headers.remove(header::TRANSFER_ENCODING);
                parts.headers.insert(header::CONTENT_LENGTH, value);
            }),
        }
    }
}

impl fmt::Debug for TransformableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformableStream")
            .field("side", &self.side())
            .field("buffered", &self.buffer.as_ref().map(|b| b.len()))
            .field("transformer", &self.transformer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    struct Reverse {
        seen: Arc<Mutex<Vec<Bytes>>>,
    }

    impl BodyTransformer for Reverse {
        fn transform(&self, content: Bytes) -> Result<ChunkOutcome, TransformationError> {
            self.seen.lock().push(content.clone());
            let mut reversed = content.to_vec();
            reversed.reverse();
            Ok(ChunkOutcome::Emit(Bytes::from(reversed)))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl BodyTransformer for Broken {
        fn transform(&self, _content: Bytes) -> Result<ChunkOutcome, TransformationError> {
            Err(TransformationError::new("cannot transform"))
        }
    }

    #[test]
    fn test_chunks_transformed_once_as_whole_body() {
        let res = GatewayResponse::pending();
        res.set_header("transfer-encoding", "chunked").unwrap();

        let transformer = Reverse::default();
        let mut stream = TransformableStream::on_response(&res, transformer.clone());
        stream.write("hel");
        stream.write(b"lo");

        let body = stream.end().unwrap();
        assert_eq!(body, Some(Bytes::from_static(b"olleh")));
        assert_eq!(transformer.seen.lock().as_slice(), &[Bytes::from_static(b"hello")]);

        assert_eq!(res.header("content-length").as_deref(), Some("5"));
        assert_eq!(res.header("transfer-encoding"), None);
    }

    #[test]
    fn test_empty_stream_still_transformed() {
        let (req, _) = GatewayRequest::from_request(http::Request::new(()));
        let transformer = Reverse::default();
        let stream = TransformableStream::on_request(&req, transformer.clone());

        assert_eq!(stream.side(), BodySide::Request);
        assert_eq!(stream.end().unwrap(), Some(Bytes::new()));
        assert_eq!(transformer.seen.lock().as_slice(), &[Bytes::new()]);
        assert_eq!(req.header("content-length").as_deref(), Some("0"));
    }

    #[test]
    fn test_transformer_error_propagates() {
        let (req, _) = GatewayRequest::from_request(http::Request::new(()));
        let mut stream = TransformableStream::on_request(&req, Broken);
        stream.write("payload");

        let err = stream.end().unwrap_err();
        assert_eq!(err.message(), "cannot transform");
    }
}
