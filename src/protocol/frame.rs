//! Request frame parsing.
//!
//! `request = u32 argc ; (u32 size ; bytes)*argc`. All integers are
//! little-endian, decoded byte-wise rather than reinterpreted in place
//! (spec.md §9's framing-arithmetic design note).
//!
//! Ground truth: `common/conn.cxx`'s `tryOneRequest` (the `messageLength >
//! MAX_MESSAGE_SIZE` / `currentPosition != length` checks) and
//! `common/req.cxx`'s `Request::parse` (`count > MAX_NUM_ARGS`, the
//! per-argument bounds check).

use crate::errors::FramingError;
use super::MAX_ARGS;

fn read_u32_le(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Parse one request body (the bytes after the outer `total_len` prefix)
/// into its argument vector.
pub fn parse_request(body: &[u8]) -> Result<Vec<Vec<u8>>, FramingError> {
    if body.len() < 4 {
        return Err(FramingError::Truncated);
    }
    let argc = read_u32_le(body, 0);
    if argc > MAX_ARGS {
        return Err(FramingError::TooManyArgs);
    }

    let mut pos = 4usize;
    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        if pos + 4 > body.len() {
            return Err(FramingError::Truncated);
        }
        let len = read_u32_le(body, pos) as usize;
        pos += 4;
        if pos + len > body.len() {
            return Err(FramingError::Truncated);
        }
        args.push(body[pos..pos + len].to_vec());
        pos += len;
    }

    if pos != body.len() {
        return Err(FramingError::TrailingGarbage);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_request(args: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(args.len() as u32).to_le_bytes());
        for a in args {
            out.extend_from_slice(&(a.len() as u32).to_le_bytes());
            out.extend_from_slice(a);
        }
        out
    }

    #[test]
    fn parses_well_formed_request() {
        let body = encode_request(&[b"set", b"k", b"v"]);
        let parsed = parse_request(&body).unwrap();
        assert_eq!(parsed, vec![b"set".to_vec(), b"k".to_vec(), b"v".to_vec()]);
    }

    #[test]
    fn rejects_too_many_args() {
        let mut body = Vec::new();
        body.extend_from_slice(&((MAX_ARGS + 1).to_le_bytes()));
        assert_eq!(parse_request(&body), Err(FramingError::TooManyArgs));
    }

    #[test]
    fn rejects_truncated_argument() {
        let mut body = encode_request(&[b"set"]);
        body.truncate(body.len() - 1);
        assert_eq!(parse_request(&body), Err(FramingError::Truncated));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut body = encode_request(&[b"get", b"k"]);
        body.push(0xFF);
        assert_eq!(parse_request(&body), Err(FramingError::TrailingGarbage));
    }
}
