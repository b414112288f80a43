//! Built-in request and response transforms.
//!
//! The request side turns any [`Body`] into bytes, setting `Content-Type`
//! when the caller did not. The response side decodes gzip and brotli
//! bodies; a decoder whose encoding does not match is a no-op.

use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use relay_core::{
    Body, BoxError, ContentType, ErrorKind, JsonCodec, TransformRequest, TransformResponse,
};

/// Default request pipeline: [`ConvertRequestBody`] with the given codec.
#[must_use]
pub fn default_transform_request(codec: Arc<dyn JsonCodec>) -> Vec<Arc<dyn TransformRequest>> {
    vec![Arc::new(ConvertRequestBody::new(codec))]
}

/// Default response pipeline: gzip then brotli decoding.
#[must_use]
pub fn default_transform_response() -> Vec<Arc<dyn TransformResponse>> {
    vec![Arc::new(GzipDecoder), Arc::new(BrotliDecoder)]
}

fn set_content_type_if_unset(headers: &mut HeaderMap, content_type: ContentType) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(content_type.as_str()));
}

/// Encodes a request body to bytes.
///
/// - bytes and readers pass through
/// - text is sent as UTF-8
/// - form values are URL-encoded (`application/x-www-form-urlencoded`)
/// - structured values are JSON-encoded with the codec (`application/json`)
#[derive(Clone)]
pub struct ConvertRequestBody {
    codec: Arc<dyn JsonCodec>,
}

impl ConvertRequestBody {
    /// Create the transform with a JSON codec.
    #[must_use]
    pub fn new(codec: Arc<dyn JsonCodec>) -> Self {
        Self { codec }
    }
}

impl std::fmt::Debug for ConvertRequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertRequestBody").finish_non_exhaustive()
    }
}

impl TransformRequest for ConvertRequestBody {
    fn transform(&self, body: Body, headers: &mut HeaderMap) -> Result<Body, BoxError> {
        let body = match body {
            Body::Bytes(_) | Body::Reader(_) => body,
            Body::Text(text) => Body::Bytes(Bytes::from(text)),
            Body::Form(values) => {
                set_content_type_if_unset(headers, ContentType::FormUrlEncoded);
                Body::Bytes(Bytes::from(values.encode()))
            }
            Body::Structured(value) => {
                let bytes = self.codec.marshal(&value)?;
                set_content_type_if_unset(headers, ContentType::Json);
                Body::Bytes(bytes)
            }
        };
        Ok(body)
    }
}

/// Decode `data` when `Content-Encoding` equals `encoding`, ignoring case.
///
/// On success the encoding and length headers are removed: they describe
/// the bytes on the wire, not the decoded body.
fn decode_with(
    encoding: &'static str,
    data: Bytes,
    headers: &mut HeaderMap,
    decode: impl FnOnce(&[u8], &mut Vec<u8>) -> io::Result<()>,
) -> Result<Bytes, BoxError> {
    let matches = headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(encoding));
    if !matches {
        return Ok(data);
    }

    let mut decoded = Vec::with_capacity(data.len().saturating_mul(2));
    decode(data.as_ref(), &mut decoded).map_err(|source| ErrorKind::Decompression { encoding, source })?;

    headers.remove(CONTENT_ENCODING);
    headers.remove(CONTENT_LENGTH);
    Ok(Bytes::from(decoded))
}

/// Decodes `Content-Encoding: gzip` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipDecoder;

impl TransformResponse for GzipDecoder {
    fn transform(&self, data: Bytes, headers: &mut HeaderMap) -> Result<Bytes, BoxError> {
        decode_with("gzip", data, headers, |input, output| {
            flate2::read::GzDecoder::new(input)
                .read_to_end(output)
                .map(drop)
        })
    }
}

/// Decodes `Content-Encoding: br` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrotliDecoder;

impl TransformResponse for BrotliDecoder {
    fn transform(&self, data: Bytes, headers: &mut HeaderMap) -> Result<Bytes, BoxError> {
        decode_with("br", data, headers, |mut input, output| {
            brotli::BrotliDecompress(&mut input, output)
        })
    }
}
