//! Decoder for PHP's native session format.
//!
//! A session file written with `session.serialize_handler = php` is a run of
//! `name|<serialized value>` entries, e.g.
//! `loggedInAs|i:42;cart|a:1:{i:0;s:3:"sku";}`.

use std::collections::HashMap;

/// Deepest array/object nesting accepted before decoding gives up.
const MAX_DEPTH: usize = 64;

/// A value decoded from PHP's `serialize()` format.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<(PhpValue, PhpValue)>),
    Object {
        class: String,
        properties: Vec<(PhpValue, PhpValue)>,
    },
}

impl PhpValue {
    /// Interpret the value as a member id. Zero and negative ids mean anonymous.
    pub fn as_member_id(&self) -> Option<u64> {
        let id: Option<u64> = match self {
            PhpValue::Int(id) => u64::try_from(*id).ok(),
            PhpValue::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        id.filter(|id| *id > 0)
    }
}

/// Error decoding a PHP session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhpDecodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("expected '{expected}' at byte {pos}")]
    Expected { expected: char, pos: usize },

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("unsupported value type '{tag}' at byte {pos}")]
    Unsupported { tag: char, pos: usize },

    #[error("values nested too deeply at byte {0}")]
    TooDeep(usize),
}

/// Decode a whole session payload into its top-level variables.
pub fn decode_session(input: &[u8]) -> Result<HashMap<String, PhpValue>, PhpDecodeError> {
    let mut decoder = Decoder {
        input,
        pos: 0,
        depth: 0,
    };
    let mut session = HashMap::new();

    while decoder.pos < input.len() {
        let name_end = input[decoder.pos..]
            .iter()
            .position(|b| *b == b'|')
            .map(|offset| decoder.pos + offset)
            .ok_or(PhpDecodeError::Expected {
                expected: '|',
                pos: input.len(),
            })?;
        let name = String::from_utf8_lossy(&input[decoder.pos..name_end]).into_owned();
        decoder.pos = name_end + 1;

        let value = decoder.value()?;
        session.insert(name, value);
    }

    Ok(session)
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, PhpDecodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(PhpDecodeError::UnexpectedEof(self.pos))
    }

    fn expect(&mut self, byte: u8) -> Result<(), PhpDecodeError> {
        if self.peek()? != byte {
            return Err(PhpDecodeError::Expected {
                expected: byte as char,
                pos: self.pos,
            });
        }
        self.pos += 1;
        Ok(())
    }

    /// Bytes up to (not including) `terminator`, consuming the terminator.
    fn until(&mut self, terminator: u8) -> Result<&'a [u8], PhpDecodeError> {
        let start = self.pos;
        let offset = self.input[start..]
            .iter()
            .position(|b| *b == terminator)
            .ok_or(PhpDecodeError::UnexpectedEof(self.input.len()))?;
        self.pos = start + offset + 1;
        Ok(&self.input[start..start + offset])
    }

    fn number<T: std::str::FromStr>(&mut self, terminator: u8) -> Result<T, PhpDecodeError> {
        let pos = self.pos;
        let raw = self.until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(PhpDecodeError::InvalidNumber(pos))
    }

    /// A length-prefixed, double-quoted string: `<len>:"<bytes>"`.
    fn quoted(&mut self) -> Result<String, PhpDecodeError> {
        let len: usize = self.number(b':')?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .ok_or(PhpDecodeError::UnexpectedEof(self.input.len()))?;
        let bytes = self
            .input
            .get(self.pos..end)
            .ok_or(PhpDecodeError::UnexpectedEof(self.input.len()))?;
        let value = String::from_utf8_lossy(bytes).into_owned();
        self.pos = end;
        self.expect(b'"')?;
        Ok(value)
    }

    fn entries(&mut self) -> Result<Vec<(PhpValue, PhpValue)>, PhpDecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(PhpDecodeError::TooDeep(self.pos));
        }
        let count: usize = self.number(b':')?;
        self.expect(b'{')?;

        self.depth += 1;
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.value()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.depth -= 1;

        self.expect(b'}')?;
        Ok(entries)
    }

    fn value(&mut self) -> Result<PhpValue, PhpDecodeError> {
        let tag_pos = self.pos;
        let tag = self.peek()?;
        self.pos += 1;

        if tag == b'N' {
            self.expect(b';')?;
            return Ok(PhpValue::Null);
        }
        self.expect(b':')?;

        match tag {
            b'b' => {
                let flag: u8 = self.number(b';')?;
                Ok(PhpValue::Bool(flag != 0))
            }
            b'i' => Ok(PhpValue::Int(self.number(b';')?)),
            b'd' => {
                let pos = self.pos;
                let raw = self.until(b';')?;
                let value = match raw {
                    b"INF" => f64::INFINITY,
                    b"-INF" => f64::NEG_INFINITY,
                    b"NAN" => f64::NAN,
                    _ => std::str::from_utf8(raw)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or(PhpDecodeError::InvalidNumber(pos))?,
                };
                Ok(PhpValue::Float(value))
            }
            b's' => {
                let value = self.quoted()?;
                self.expect(b';')?;
                Ok(PhpValue::String(value))
            }
            b'a' => Ok(PhpValue::Array(self.entries()?)),
            b'O' => {
                let class = self.quoted()?;
                self.expect(b':')?;
                let properties = self.entries()?;
                Ok(PhpValue::Object { class, properties })
            }
            other => Err(PhpDecodeError::Unsupported {
                tag: other as char,
                pos: tag_pos,
            }),
        }
    }
}
