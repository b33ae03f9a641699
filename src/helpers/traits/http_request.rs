use std::collections::HashMap;

use http::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE};
use http::Request;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::helpers::traits::bytes::{SplitBytes, CRLF, HEADER_END, HEADER_END_LENIENT, LF};
use crate::helpers::traits::GetHeaderChild;
use crate::Body;

const FILENAME_MARKER: &[u8] = b"filename=\"";

/// The single file carried by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub body: Vec<u8>,
}

pub trait RequestUtils {
    fn query_params(&self) -> HashMap<String, String>;
    fn boundary(&self) -> Option<String>;
    fn accepts_gzip(&self) -> bool;
    fn is_authorized(&self, secret: &str) -> bool;
    fn get_multi_part(&self) -> Option<UploadedFile>;
}

impl RequestUtils for Request<Body> {
    fn query_params(&self) -> HashMap<String, String> {
        self.uri().query().map(parse_query).unwrap_or_default()
    }

    fn boundary(&self) -> Option<String> {
        let content_type = self.headers().get(CONTENT_TYPE)?.to_str().ok()?;
        let params = content_type.get_header_child();
        params
            .get("boundary")
            .filter(|boundary| !boundary.is_empty())
            .map(|boundary| boundary.to_string())
    }

    fn accepts_gzip(&self) -> bool {
        self.headers()
            .get(ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false)
    }

    fn is_authorized(&self, secret: &str) -> bool {
        self.headers()
            .get(AUTHORIZATION)
            .map(|value| value.as_bytes() == format!("Bearer {secret}").as_bytes())
            .unwrap_or(false)
    }

    fn get_multi_part(&self) -> Option<UploadedFile> {
        let boundary = self.boundary()?;
        decode_multipart(&self.body().bytes, &boundary)
    }
}

/// `a=1&b=x+y&a=2` → `{a: 2, b: "x y"}`; the last duplicate wins.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key), decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Pulls the first file out of a `multipart/form-data` body.
///
/// Only the first part carrying `filename="` is looked at. Its content runs
/// from the part's own blank line to the last CRLF before the next boundary,
/// or to the last LF when no CRLF follows the blank line. When a client omits
/// that closing CRLF, a file ending in CRLF loses its own last two bytes
/// instead.
pub fn decode_multipart(body: &[u8], boundary: &str) -> Option<UploadedFile> {
    let delimiter = format!("--{boundary}");

    let part = body
        .split_bytes(delimiter.as_bytes())
        .into_iter()
        .find(|part| part.find_bytes(FILENAME_MARKER).is_some())?;

    let name_start = part.find_bytes(FILENAME_MARKER)? + FILENAME_MARKER.len();
    let name_end = name_start + part[name_start..].iter().position(|&b| b == b'"')?;
    let file_name = match std::str::from_utf8(&part[name_start..name_end]) {
        Ok(name) => name.to_owned(),
        Err(e) => {
            debug!("multipart filename is not utf-8: {e}");
            return None;
        }
    };

    let content_start = match part.find_bytes(HEADER_END) {
        Some(pos) => pos + HEADER_END.len(),
        None => part.find_bytes(HEADER_END_LENIENT)? + HEADER_END_LENIENT.len(),
    };
    let content_end = match part.rfind_bytes(CRLF) {
        // a CRLF inside the sub-header block does not end the content
        Some(pos) if pos >= content_start => pos,
        _ => part.rfind_bytes(LF)?,
    };
    if content_end < content_start {
        return None;
    }

    let content = &part[content_start..content_end];
    if file_name.is_empty() || content.is_empty() {
        return None;
    }

    Some(UploadedFile {
        file_name,
        body: content.to_vec(),
    })
}
