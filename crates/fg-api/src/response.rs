use std::io::Write;

use axum::http::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, VARY,
};
use axum::response::{IntoResponse, Response};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;

use crate::error::ApiError;

const CACHE_POLICY: &str = "max-age=3600";

pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("gzip"))
}

/// Cacheable JSON body, gzip-compressed when the client accepts it.
#[derive(Debug)]
pub struct CachedJson<T> {
    body: T,
    gzip: bool,
}

impl<T: Serialize> CachedJson<T> {
    pub fn new(body: T, request_headers: &HeaderMap) -> Self {
        Self {
            body,
            gzip: accepts_gzip(request_headers),
        }
    }

    fn render(&self) -> Result<Response, ApiError> {
        let json = serde_json::to_vec(&self.body)
            .map_err(|err| ApiError::Internal(format!("failed to encode response: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_POLICY));
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));

        if !self.gzip {
            return Ok((headers, json).into_response());
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::best());
        let compressed = encoder
            .write_all(&json)
            .and_then(|_| encoder.finish())
            .map_err(|err| ApiError::Internal(format!("failed to compress response: {err}")))?;

        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        Ok((headers, compressed).into_response())
    }
}

impl<T: Serialize> IntoResponse for CachedJson<T> {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;

    async fn bytes_of(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[test]
    fn gzip_detection_reads_every_accept_encoding_value() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));

        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("br"));
        assert!(!accepts_gzip(&headers));

        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("deflate, gzip;q=0.8"));
        assert!(accepts_gzip(&headers));
    }

    #[tokio::test]
    async fn plain_body_carries_cache_headers() {
        let response = CachedJson::new(json!({"search": "rift"}), &HeaderMap::new()).into_response();

        assert_eq!(response.headers()[CACHE_CONTROL], "max-age=3600");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers().get(CONTENT_ENCODING).is_none());

        let body: serde_json::Value = serde_json::from_slice(&bytes_of(response).await).unwrap();
        assert_eq!(body["search"], "rift");
    }

    #[tokio::test]
    async fn gzip_body_decompresses_to_the_json() {
        let mut request = HeaderMap::new();
        request.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let response = CachedJson::new(json!({"fits": [1, 2, 3]}), &request).into_response();
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");

        let mut decoded = String::new();
        GzDecoder::new(bytes_of(response).await.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, r#"{"fits":[1,2,3]}"#);
    }
}
