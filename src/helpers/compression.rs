use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Content codings the endpoint can apply to a response body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentCoding {
    /// [RFC 1952](https://datatracker.ietf.org/doc/html/rfc1952)
    Gzip,
}

impl ContentCoding {
    pub fn encode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            ContentCoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }

    /// Token used in `Content-Encoding` and `Accept-Encoding`.
    pub fn http_identifier(&self) -> &'static str {
        match self {
            ContentCoding::Gzip => "gzip",
        }
    }
}
