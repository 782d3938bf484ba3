//! Ingestion gateway handlers.

use std::io::{self, Write};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use flate2::write::GzDecoder;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use docstore_index::validate;
use docstore_model::{DocumentKind, DocumentMetadata, IngestionEvent};
use docstore_storage::ContentDigest;

use crate::errors::ApiError;
use crate::state::AppState;

/// Query parameters for publishing a document.
#[derive(Debug, Deserialize)]
pub struct PublishParams {
    /// Externally assigned document identifier.
    pub id: Option<String>,
}

/// Response body for a successful publish.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Metadata of the stored document.
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
    /// True when the ingestion event could not be appended after retries:
    /// the document is durably stored and readable by id, but searchability
    /// is delayed until the log recovers.
    pub index_delayed: bool,
}

/// Sink accumulating canonical bytes while digesting them, bounded by the
/// configured maximum payload size.
#[derive(Debug)]
struct CanonicalSink {
    buf: Vec<u8>,
    digest: ContentDigest,
    limit: u64,
}

impl CanonicalSink {
    fn new(limit: u64) -> Self {
        Self {
            buf: Vec::new(),
            digest: ContentDigest::new(),
            limit,
        }
    }

    fn finish(self) -> (Bytes, String) {
        (Bytes::from(self.buf), self.digest.finalize())
    }
}

impl Write for CanonicalSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() as u64 + data.len() as u64 > self.limit {
            // WriteZero marks the size cap; mapped to 413 by the handler.
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "payload limit exceeded",
            ));
        }
        self.digest.update(data);
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streaming body decoder: identity passthrough or gzip, both feeding the
/// canonical sink chunk-by-chunk.
#[derive(Debug)]
enum Decoder {
    Identity(CanonicalSink),
    Gzip(GzDecoder<CanonicalSink>),
}

impl Decoder {
    fn new(encoding: Option<&str>, limit: u64) -> Result<Self, ApiError> {
        match encoding {
            None | Some("identity") => Ok(Self::Identity(CanonicalSink::new(limit))),
            Some("gzip") | Some("x-gzip") => Ok(Self::Gzip(GzDecoder::new(CanonicalSink::new(limit)))),
            Some(other) => Err(ApiError::validation(format!(
                "Unsupported content-encoding: {other}"
            ))),
        }
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Identity(sink) => sink.write_all(chunk),
            Self::Gzip(decoder) => decoder.write_all(chunk),
        }
    }

    fn finish(self) -> io::Result<CanonicalSink> {
        match self {
            Self::Identity(sink) => Ok(sink),
            Self::Gzip(decoder) => decoder.finish(),
        }
    }
}

fn map_decode_error(err: io::Error, limit: u64) -> ApiError {
    if err.kind() == io::ErrorKind::WriteZero {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::validation(format!("Invalid request payload: {err}"))
    }
}

/// `POST /api/v1/{resource}?id=` — validate, store, then publish the event.
///
/// The payload streams through decompression and digesting; canonical
/// bytes are spooled up to the configured maximum so the format check runs
/// before the single atomic store write. The event append happens strictly
/// after the store write, so no consumer can observe an event whose
/// payload is not yet retrievable. A client disconnect mid-stream aborts
/// the request before anything is stored.
#[instrument(skip(state, headers, body), fields(resource = %resource))]
pub async fn publish_document(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<PublishParams>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let kind: DocumentKind = resource
        .parse()
        .map_err(|_| ApiError::UnknownResource(resource.clone()))?;
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ApiError::MissingParameter("id"))?;

    let limit = state.config.max_payload_bytes;
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok());
    let mut decoder = Decoder::new(encoding, limit)?;

    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|err| ApiError::Body(err.to_string()))?
    {
        decoder
            .write(&chunk)
            .map_err(|err| map_decode_error(err, limit))?;
    }
    let sink = decoder.finish().map_err(|err| map_decode_error(err, limit))?;
    let (payload, digest) = sink.finish();

    validate(kind, &payload)?;

    // Store-then-publish: the payload must be retrievable before any
    // consumer can observe the event. Exhausted retries here are fatal to
    // the request; nothing has been made visible yet.
    state
        .config
        .retry
        .run("store document payload", || {
            state.documents.put(kind, &id, payload.clone())
        })
        .await?;

    let metadata = DocumentMetadata {
        id: id.clone(),
        kind,
        digest,
        size: payload.len() as u64,
        stored_at: Utc::now(),
    };
    let event = IngestionEvent::new(&metadata);

    let appended = state
        .config
        .retry
        .run("append ingestion event", || state.log.append(event.clone()))
        .await;
    let index_delayed = match appended {
        Ok(offset) => {
            debug!(kind = %kind, id = %id, offset = offset, size = metadata.size, "Document stored and event appended");
            false
        }
        Err(err) => {
            // The document is durably stored and readable by id; only
            // searchability is delayed until the log recovers.
            error!(kind = %kind, id = %id, error = %err, "Failed to append ingestion event after retries");
            true
        }
    };

    let response = PublishResponse {
        metadata,
        index_delayed,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_identity_decoder_digests_canonical_bytes() {
        let mut decoder = Decoder::new(None, 1024).unwrap();
        decoder.write(b"hello").unwrap();
        let (payload, digest) = decoder.finish().unwrap().finish();
        assert_eq!(payload, Bytes::from_static(b"hello"));
        assert_eq!(digest, ContentDigest::of(b"hello"));
    }

    #[test]
    fn test_gzip_decoder_yields_canonical_bytes() {
        let compressed = gzip(b"canonical content");
        let mut decoder = Decoder::new(Some("gzip"), 1024).unwrap();
        // Feed in small chunks, as a streaming body would.
        for chunk in compressed.chunks(7) {
            decoder.write(chunk).unwrap();
        }
        let (payload, digest) = decoder.finish().unwrap().finish();
        assert_eq!(payload, Bytes::from_static(b"canonical content"));
        assert_eq!(digest, ContentDigest::of(b"canonical content"));
    }

    #[test]
    fn test_size_cap_applies_to_decompressed_bytes() {
        let compressed = gzip(&vec![b'a'; 4096]);
        assert!(compressed.len() < 256, "gzip should compress well here");

        let mut decoder = Decoder::new(Some("gzip"), 256).unwrap();
        let mut failed: Option<io::Error> = None;
        for chunk in compressed.chunks(16) {
            if let Err(err) = decoder.write(chunk) {
                failed = Some(err);
                break;
            }
        }
        let err = match failed {
            Some(err) => err,
            None => decoder
                .finish()
                .map(|_| ())
                .expect_err("oversized payload must be rejected"),
        };
        assert!(matches!(
            map_decode_error(err, 256),
            ApiError::PayloadTooLarge(256)
        ));
    }

    #[test]
    fn test_corrupt_gzip_is_a_validation_error() {
        let mut decoder = Decoder::new(Some("gzip"), 1024).unwrap();
        let err = decoder
            .write(b"definitely not gzip data")
            .err()
            .or_else(|| decoder.finish().err())
            .expect("corrupt stream must fail");
        assert!(matches!(
            map_decode_error(err, 1024),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let err = Decoder::new(Some("zstd"), 1024).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
