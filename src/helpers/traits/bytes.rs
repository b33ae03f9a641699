pub const CRLF: &[u8] = b"\r\n";
pub const LF: &[u8] = b"\n";
pub const HEADER_END: &[u8] = b"\r\n\r\n";
pub const HEADER_END_LENIENT: &[u8] = b"\n\n";

pub trait SplitBytes {
    fn split_bytes(&self, delimiter: &[u8]) -> Vec<&[u8]>;
    fn split_header_body(&self) -> Option<(&[u8], &[u8])>;
    fn find_bytes(&self, needle: &[u8]) -> Option<usize>;
    fn rfind_bytes(&self, needle: &[u8]) -> Option<usize>;
}

impl SplitBytes for [u8] {
    /// Splits on every occurrence of `delimiter`, dropping empty segments.
    fn split_bytes(&self, delimiter: &[u8]) -> Vec<&[u8]> {
        let mut result = Vec::new();
        if delimiter.is_empty() {
            if !self.is_empty() {
                result.push(self);
            }
            return result;
        }

        let mut start = 0;
        let mut i = 0;
        while i + delimiter.len() <= self.len() {
            if &self[i..i + delimiter.len()] == delimiter {
                if start < i {
                    result.push(&self[start..i]);
                }
                i += delimiter.len();
                start = i;
            } else {
                i += 1;
            }
        }
        if start < self.len() {
            result.push(&self[start..]);
        }
        result
    }

    /// Splits at the first `\r\n\r\n`, or at the first `\n\n` when the strict
    /// form never appears. Neither half is decoded.
    fn split_header_body(&self) -> Option<(&[u8], &[u8])> {
        if let Some(pos) = self.find_bytes(HEADER_END) {
            return Some((&self[..pos], &self[pos + HEADER_END.len()..]));
        }
        self.find_bytes(HEADER_END_LENIENT)
            .map(|pos| (&self[..pos], &self[pos + HEADER_END_LENIENT.len()..]))
    }

    fn find_bytes(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len() {
            return None;
        }
        self.windows(needle.len()).position(|window| window == needle)
    }

    fn rfind_bytes(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len() {
            return None;
        }
        self.windows(needle.len()).rposition(|window| window == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_bytes_skips_empty_segments() {
        let data: &[u8] = b"--XYZabc--XYZ--XYZdef";
        assert_eq!(data.split_bytes(b"--XYZ"), vec![&b"abc"[..], &b"def"[..]]);
    }

    #[test]
    fn split_bytes_handles_delimiters_that_overlap_themselves() {
        let data: &[u8] = b"a----b";
        assert_eq!(data.split_bytes(b"--"), vec![&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn header_body_prefers_crlf() {
        let raw: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody\n\nmore";
        let (head, body) = raw.split_header_body().unwrap();
        assert_eq!(head, b"GET / HTTP/1.1\r\nHost: x");
        assert_eq!(body, b"body\n\nmore");
    }

    #[test]
    fn header_body_falls_back_to_bare_newlines() {
        let raw: &[u8] = b"GET / HTTP/1.1\nHost: x\n\n\x00\xff";
        let (head, body) = raw.split_header_body().unwrap();
        assert_eq!(head, b"GET / HTTP/1.1\nHost: x");
        assert_eq!(body, b"\x00\xff");
    }

    #[test]
    fn header_body_without_delimiter() {
        let raw: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n";
        assert!(raw.split_header_body().is_none());
    }

    #[test]
    fn body_is_lossless_around_the_delimiter() {
        let head: &[u8] = b"POST / HTTP/1.1\r\nContent-Length: 6";
        let body: &[u8] = b"\x00\r\n\xfe\x10\n";
        let raw = [head, HEADER_END, body].concat();
        let (h, b) = raw.as_slice().split_header_body().unwrap();
        assert_eq!([h, HEADER_END, b].concat(), raw);
        assert_eq!(b, body);
    }

    #[test]
    fn find_and_rfind() {
        let data: &[u8] = b"a\r\nb\r\nc";
        assert_eq!(data.find_bytes(CRLF), Some(1));
        assert_eq!(data.rfind_bytes(CRLF), Some(4));
        assert_eq!(data.rfind_bytes(b"zz"), None);
        assert_eq!(data.find_bytes(b""), None);
    }
}
