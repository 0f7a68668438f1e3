//! Tagged reply sum type and its little-endian encoder.
//!
//! Ground truth: `common/serialize.cxx`'s `out::nil/str/num/dbl/err/arr`
//! for the tag values and payload shapes. Design note 9: "Model the reply
//! as a sum type ... and write the serializer as a deterministic encoder
//! over that sum." `Reply` is materialized before encoding, so the
//! begin/end streaming protocol the note mentions is unnecessary here.

use crate::errors::CommandError;
use super::MAX_MESSAGE_SIZE;

pub const TAG_NIL: u8 = 0;
pub const TAG_ERR: u8 = 1;
pub const TAG_STR: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_DBL: u8 = 4;
pub const TAG_ARR: u8 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Err(i32, Vec<u8>),
    Str(Vec<u8>),
    Int(i64),
    Dbl(f64),
    Arr(Vec<Reply>),
}

impl Reply {
    pub fn err(e: CommandError) -> Reply {
        Reply::Err(e.code(), e.message().to_vec())
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Nil => out.push(TAG_NIL),
            Reply::Err(code, msg) => {
                out.push(TAG_ERR);
                out.extend_from_slice(&code.to_le_bytes());
                out.extend_from_slice(&(msg.len() as u32).to_le_bytes());
                out.extend_from_slice(msg);
            }
            Reply::Str(bytes) => {
                out.push(TAG_STR);
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Reply::Int(v) => {
                out.push(TAG_INT);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Reply::Dbl(v) => {
                out.push(TAG_DBL);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Reply::Arr(items) => {
                out.push(TAG_ARR);
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// Encode this reply, substituting `ERR(TOO_BIG)` if the encoding
    /// would exceed the 4096-byte cap (spec.md §4.6).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        if out.len() > MAX_MESSAGE_SIZE {
            out.clear();
            Reply::err(CommandError::TooBig).encode_into(&mut out);
        }
        out
    }
}
