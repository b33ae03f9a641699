use std::borrow::Cow;

use async_trait::async_trait;
use http::header::{
    HeaderName, ALLOW, CONNECTION, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_TYPE, WWW_AUTHENTICATE,
};
use http::Response;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::Payload;

#[async_trait]
pub trait ResponseUtil {
    /// Status line, headers and body, byte for byte as sent.
    fn to_bytes(&self) -> Vec<u8>;
    async fn responser<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send;
}

#[async_trait]
impl ResponseUtil for Response<Payload> {
    fn to_bytes(&self) -> Vec<u8> {
        let body = &self.body().bytes;
        let status = self.status();

        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_str(),
            status.canonical_reason().unwrap_or("Unknown")
        );

        if let Some(value) = self.headers().get(CONTENT_TYPE) {
            head.push_str(&format!(
                "Content-Type: {}\r\n",
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        // always measured from what actually goes out
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        if let Some(coding) = self.body().coding {
            head.push_str(&format!("Content-Encoding: {}\r\n", coding.http_identifier()));
        }

        let written = [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_ENCODING, CONNECTION];
        for (key, value) in self.headers().iter() {
            if written.contains(key) {
                continue;
            }
            head.push_str(&format!(
                "{}: {}\r\n",
                canonical_name(key),
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        bytes
    }

    async fn responser<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let bytes = self.to_bytes();
        trace!(status = self.status().as_u16(), bytes = bytes.len(), "sending response");
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn canonical_name(name: &HeaderName) -> Cow<'static, str> {
    let known = [
        (CONTENT_DISPOSITION, "Content-Disposition"),
        (WWW_AUTHENTICATE, "WWW-Authenticate"),
        (ALLOW, "Allow"),
    ];
    if let Some((_, canonical)) = known.iter().find(|(header, _)| header == name) {
        return Cow::Borrowed(*canonical);
    }

    let title = name
        .as_str()
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-");
    Cow::Owned(title)
}

/// MIME type guessed from the file extension.
pub fn get_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentCoding;
    use http::header::HeaderValue;
    use http::StatusCode;

    fn response(status: StatusCode, payload: Payload) -> Response<Payload> {
        let mut response = Response::new(payload);
        *response.status_mut() = status;
        response
    }

    #[test]
    fn content_length_tracks_the_payload() {
        let mut res = response(StatusCode::NOT_FOUND, Payload::new(b"<p>gone</p>".to_vec()));
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        // a stale value must never reach the wire
        res.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from_static("999"));

        let wire = String::from_utf8(res.to_bytes()).unwrap();
        assert_eq!(
            wire,
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 11\r\nConnection: close\r\n\r\n<p>gone</p>"
        );
    }

    #[test]
    fn encoded_payload_announces_its_coding() {
        let original = b"abcabcabcabcabcabcabcabc".to_vec();
        let payload = Payload::encoded(&original, ContentCoding::Gzip).unwrap();
        let compressed_len = payload.bytes.len();
        let res = response(StatusCode::OK, payload);

        let wire = res.to_bytes();
        let head_end = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let head = String::from_utf8_lossy(&wire[..head_end]);
        assert!(head.contains(&format!("Content-Length: {compressed_len}\r\n")));
        assert!(head.contains("Content-Encoding: gzip\r\n"));
        assert_eq!(wire.len() - head_end, compressed_len);
    }

    #[test]
    fn header_names_are_canonical() {
        let mut res = response(StatusCode::UNAUTHORIZED, Payload::default());
        res.headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        res.headers_mut()
            .insert(HeaderName::from_static("x-request-id"), HeaderValue::from_static("7"));

        let wire = String::from_utf8(res.to_bytes()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n"));
        assert!(wire.contains("WWW-Authenticate: Bearer\r\n"));
        assert!(wire.contains("X-Request-Id: 7\r\n"));
    }

    #[tokio::test]
    async fn responser_writes_everything() {
        let res = response(StatusCode::OK, Payload::new(vec![0, 1, 2]));
        let mut sink: Vec<u8> = Vec::new();
        res.responser(&mut sink).await.unwrap();
        assert_eq!(sink, res.to_bytes());
    }

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        assert_eq!(get_content_type("notes.txt"), "text/plain");
        assert_eq!(get_content_type("photo.png"), "image/png");
        assert_eq!(get_content_type("archive.unknownext"), "application/octet-stream");
        assert_eq!(get_content_type("README"), "application/octet-stream");
    }
}
