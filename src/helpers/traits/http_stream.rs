use std::collections::HashMap;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Uri, Version};
use tokio::io::{self, AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::helpers::traits::bytes::{SplitBytes, HEADER_END, HEADER_END_LENIENT};
use crate::{Body, ConnectionState, ServerConfig, TransferError};

/// Head of a request: the raw request line and the lower-cased header map.
#[derive(Debug, Clone, Default)]
pub struct RequestHead {
    pub request_line: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
}

impl RequestHead {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Missing or non-numeric `Content-Length` counts as zero.
    pub fn content_length(&self) -> usize {
        self.get("content-length")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    /// `METHOD SP TARGET [SP VERSION]`, split on single spaces. An empty
    /// target (`POST  HTTP/1.1`, `POST `) means `/`.
    pub fn parse_line(&self) -> Result<RequestLine, TransferError> {
        let mut parts = self.request_line.split(' ');

        let method = parts
            .next()
            .filter(|method| !method.is_empty())
            .ok_or_else(|| TransferError::MalformedRequest("empty request line".into()))?;
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TransferError::MalformedRequest(format!("bad method {method:?}")))?;

        let target = match parts.next() {
            Some("") => "/",
            Some(target) => target,
            None => {
                return Err(TransferError::MalformedRequest(format!(
                    "no request target in {:?}",
                    self.request_line
                )))
            }
        };
        let uri = target
            .parse::<Uri>()
            .map_err(|_| TransferError::MalformedRequest(format!("bad target {target:?}")))?;

        let version = match parts.next() {
            Some("HTTP/0.9") => Version::HTTP_09,
            Some("HTTP/1.0") => Version::HTTP_10,
            Some("HTTP/2.0") => Version::HTTP_2,
            Some("HTTP/3.0") => Version::HTTP_3,
            _ => Version::HTTP_11,
        };

        Ok(RequestLine {
            method,
            uri,
            version,
        })
    }
}

/// Splits raw request bytes at the header/body delimiter.
///
/// Only the head is decoded as text; the body comes back as the untouched
/// bytes following the delimiter. Lines without a `:` are ignored.
pub fn split_request(raw: &[u8]) -> Result<(RequestHead, &[u8]), TransferError> {
    let (head, body) = raw.split_header_body().ok_or_else(|| {
        TransferError::MalformedRequest("no header/body delimiter".into())
    })?;

    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();
    let request_line = lines.next().unwrap_or_default().to_owned();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_owned());
        }
    }

    Ok((
        RequestHead {
            request_line,
            headers,
        },
        body,
    ))
}

/// Reads until the head is complete, the peer closes, or the head outgrows
/// `max_header_size`. Whatever body bytes came along are kept.
pub async fn read_head<R>(reader: &mut R, config: &ServerConfig) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut bytes = Vec::new();
    let mut buf = vec![0; config.read_buffer_size.max(1)];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);

        let has_delimiter = bytes.find_bytes(HEADER_END).is_some()
            || bytes.find_bytes(HEADER_END_LENIENT).is_some();
        if has_delimiter || bytes.len() > config.max_header_size {
            break;
        }
    }

    debug!(bytes = bytes.len(), "initial read");
    Ok(bytes)
}

/// Tops `body` up to `content_length` with further reads.
///
/// Never reads past `content_length`. An early EOF leaves the body short;
/// the caller decides what that means.
pub async fn read_body<R>(
    reader: &mut R,
    mut body: Vec<u8>,
    content_length: usize,
    buffer_size: usize,
) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    body.truncate(content_length);
    let mut buf = vec![0; buffer_size.max(1)];

    while body.len() < content_length {
        let want = buf.len().min(content_length - body.len());
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    Ok(body)
}

/// Builds the `http::Request`, pulling the rest of a POST body off `reader`.
pub async fn complete_request<R>(
    reader: &mut R,
    head: &RequestHead,
    line: RequestLine,
    initial: &[u8],
    config: &ServerConfig,
) -> Result<Request<Body>, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let content_length = head.content_length();

    let bytes = if line.method == Method::POST {
        let body = read_body(reader, initial.to_vec(), content_length, config.read_buffer_size)
            .await?;
        if body.len() < content_length {
            return Err(TransferError::IncompleteBody {
                expected: content_length,
                received: body.len(),
            });
        }
        body
    } else {
        initial[..initial.len().min(content_length)].to_vec()
    };

    let mut request = Request::new(Body {
        bytes,
        content_length,
        ip: None,
    });
    *request.method_mut() = line.method;
    *request.uri_mut() = line.uri;
    *request.version_mut() = line.version;

    let headers = request.headers_mut();
    for (key, value) in &head.headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!("skipping unusable header {key:?}"),
        }
    }

    Ok(request)
}

#[async_trait]
pub trait StreamHttp {
    async fn parse_request(&mut self, config: &ServerConfig)
        -> Result<Request<Body>, TransferError>;

    /// Same as `parse_request`, reporting each parse stage to `observe` as it
    /// is entered.
    async fn parse_request_observed<F>(
        &mut self,
        config: &ServerConfig,
        observe: F,
    ) -> Result<Request<Body>, TransferError>
    where
        F: FnMut(ConnectionState) + Send;
}

#[async_trait]
impl<S> StreamHttp for S
where
    S: AsyncRead + Unpin + Send,
{
    async fn parse_request(
        &mut self,
        config: &ServerConfig,
    ) -> Result<Request<Body>, TransferError> {
        self.parse_request_observed(config, |_| {}).await
    }

    async fn parse_request_observed<F>(
        &mut self,
        config: &ServerConfig,
        mut observe: F,
    ) -> Result<Request<Body>, TransferError>
    where
        F: FnMut(ConnectionState) + Send,
    {
        observe(ConnectionState::ReadInitial);
        let raw = read_head(self, config).await?;
        if raw.is_empty() {
            return Err(TransferError::EmptyRequest);
        }

        observe(ConnectionState::ParseLine);
        let (head, initial) = split_request(&raw)?;
        let line = head.parse_line()?;

        observe(ConnectionState::ParseHeaders);
        complete_request(self, &head, line, initial, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;

    fn config() -> ServerConfig {
        ServerConfig::new(Mode::Upload)
    }

    #[test]
    fn split_lowercases_keys_and_trims_values() {
        let raw = b"GET /x HTTP/1.1\r\nHost:  example \r\nX-Weird-Case: A:B\r\nno colon here\r\n\r\n";
        let (head, body) = split_request(raw).unwrap();
        assert_eq!(head.request_line, "GET /x HTTP/1.1");
        assert_eq!(head.get("host"), Some("example"));
        assert_eq!(head.get("x-weird-case"), Some("A:B"));
        assert_eq!(head.headers.len(), 2);
        assert!(body.is_empty());
    }

    #[test]
    fn split_without_delimiter_is_malformed() {
        let err = split_request(b"GET / HTTP/1.1\r\nHost: x").unwrap_err();
        assert!(matches!(err, TransferError::MalformedRequest(_)));
    }

    #[test]
    fn split_keeps_binary_body_untouched() {
        let mut raw = b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0x00, 0xc3, 0x28]);
        let (_, body) = split_request(&raw).unwrap();
        assert_eq!(body, &[0xff, 0x00, 0xc3, 0x28]);
    }

    #[test]
    fn content_length_defaults_to_zero() {
        let (head, _) = split_request(b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n").unwrap();
        assert_eq!(head.content_length(), 0);
        let (head, _) = split_request(b"POST / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.content_length(), 0);
    }

    #[test]
    fn request_line_variants() {
        let head = |line: &str| RequestHead {
            request_line: line.into(),
            headers: HashMap::new(),
        };

        let line = head("GET /download?archivo=a%20b.txt HTTP/1.0").parse_line().unwrap();
        assert_eq!(line.method, Method::GET);
        assert_eq!(line.uri.path(), "/download");
        assert_eq!(line.uri.query(), Some("archivo=a%20b.txt"));
        assert_eq!(line.version, Version::HTTP_10);

        let line = head("POST ").parse_line().unwrap();
        assert_eq!(line.uri.path(), "/");

        let line = head("POST  HTTP/1.1").parse_line().unwrap();
        assert_eq!(line.method, Method::POST);
        assert_eq!(line.uri.path(), "/");
        assert_eq!(line.version, Version::HTTP_11);

        assert!(head("").parse_line().is_err());
        assert!(head("GET").parse_line().is_err());
        assert!(head("G(T / HTTP/1.1").parse_line().is_err());
    }

    #[tokio::test]
    async fn read_body_pulls_the_remainder() {
        let mut rest: &[u8] = b"lo world and trailing junk";
        let body = read_body(&mut rest, b"hel".to_vec(), 11, 4).await.unwrap();
        assert_eq!(body, b"hello world");
        assert_eq!(rest, b" and trailing junk");
    }

    #[tokio::test]
    async fn read_body_never_exceeds_content_length() {
        let mut rest: &[u8] = b"";
        let body = read_body(&mut rest, b"abcdef".to_vec(), 3, 4096).await.unwrap();
        assert_eq!(body, b"abc");
    }

    #[tokio::test]
    async fn read_body_stops_at_eof() {
        let mut rest: &[u8] = b"lo";
        let body = read_body(&mut rest, b"hel".to_vec(), 10, 4096).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn parse_request_completes_post_bodies() {
        let payload = vec![7u8; 10_000];
        let mut raw = format!(
            "POST / HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: {}\r\n\r\n",
            payload.len()
        )
        .into_bytes();
        raw.extend_from_slice(&payload);

        let mut stream = raw.as_slice();
        let request = stream.parse_request(&config()).await.unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.body().bytes, payload);
        assert_eq!(request.body().content_length, payload.len());
        assert_eq!(
            request.headers().get("content-type").unwrap(),
            "multipart/form-data; boundary=XYZ"
        );
    }

    #[tokio::test]
    async fn parse_request_reports_short_bodies() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 50\r\n\r\nonly a bit";
        let mut stream = &raw[..];
        let err = stream.parse_request(&config()).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::IncompleteBody {
                expected: 50,
                received: 10
            }
        ));
    }

    #[tokio::test]
    async fn parse_request_on_empty_stream() {
        let mut stream: &[u8] = b"";
        let err = stream.parse_request(&config()).await.unwrap_err();
        assert!(matches!(err, TransferError::EmptyRequest));
    }

    #[tokio::test]
    async fn stages_are_reported_in_order() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
        let mut stream = &raw[..];
        let mut stages = Vec::new();
        let request = stream
            .parse_request_observed(&config(), |stage| stages.push(stage))
            .await
            .unwrap();
        assert_eq!(request.body().bytes, b"abc");
        assert_eq!(
            stages,
            [
                ConnectionState::ReadInitial,
                ConnectionState::ParseLine,
                ConnectionState::ParseHeaders
            ]
        );

        let mut stages = Vec::new();
        let mut stream = &b"G(T / HTTP/1.1\r\n\r\n"[..];
        let err = stream
            .parse_request_observed(&config(), |stage| stages.push(stage))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::MalformedRequest(_)));
        assert_eq!(stages.last(), Some(&ConnectionState::ParseLine));
    }

    #[tokio::test]
    async fn get_requests_do_not_wait_for_a_body() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut stream = &raw[..];
        let request = stream.parse_request(&config()).await.unwrap();
        assert_eq!(request.method(), Method::GET);
        assert!(request.body().is_empty());
    }
}
