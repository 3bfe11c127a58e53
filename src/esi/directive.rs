//! `<esi:include>` scanning, parsing and substitution.
//!
//! Directives are found by byte pattern rather than by parsing the document,
//! so the surrounding HTML is never normalized or re-serialized. Each matched
//! tag is then parsed on its own to extract attributes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use axum::body::Bytes;
use regex::bytes::{Captures, Regex};

/// Replacement for any directive that cannot be resolved.
pub const INVALID_TAG_MARKER: &[u8] = b"<!-- invalid esi tag -->";

const TAG_PREFIX: &str = "<esi:include";

static DIRECTIVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<esi:include[^>]*>").expect("directive pattern is valid"));

/// Error parsing a matched directive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("directive markup is not valid UTF-8")]
    NotUtf8,

    #[error("not an esi:include tag")]
    NotDirective,

    #[error("malformed attribute at offset {0}")]
    Malformed(usize),

    #[error("esi:include has no src")]
    MissingSrc,
}

/// A parsed `<esi:include ...>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub src: String,
    /// Resolution strategy; `None` selects the default include processor.
    pub processor: Option<String>,
    /// Identity strategy applied to the side-request, if any.
    pub partitioner: Option<String>,
    /// Every other attribute, by lower-cased name.
    pub attributes: BTreeMap<String, String>,
}

impl Directive {
    /// Parse the literal text of one matched directive.
    pub fn parse(markup: &[u8]) -> Result<Self, DirectiveError> {
        let markup = std::str::from_utf8(markup).map_err(|_| DirectiveError::NotUtf8)?;
        let inner = markup
            .strip_prefix(TAG_PREFIX)
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or(DirectiveError::NotDirective)?;

        let inner = inner.trim_end();
        let inner = inner.strip_suffix('/').unwrap_or(inner);
        if !inner.is_empty() && !inner.starts_with(|c: char| c.is_ascii_whitespace()) {
            return Err(DirectiveError::NotDirective);
        }

        let mut src = None;
        let mut processor = None;
        let mut partitioner = None;
        let mut attributes = BTreeMap::new();

        for (name, value) in parse_attributes(inner)? {
            let slot = match name.as_str() {
                "src" => &mut src,
                "processor" => &mut processor,
                "partitioner" => &mut partitioner,
                _ => {
                    attributes.entry(name).or_insert(value);
                    continue;
                }
            };
            // First occurrence wins, as in HTML.
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        let src = src.filter(|s| !s.is_empty()).ok_or(DirectiveError::MissingSrc)?;

        Ok(Self {
            src,
            processor: processor.filter(|p| !p.is_empty()),
            partitioner: partitioner.filter(|p| !p.is_empty()),
            attributes,
        })
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, '=' | '"' | '\'' | '<' | '>' | '/')
}

/// Lex `name="v" name='v' name=v name` attribute lists.
fn parse_attributes(input: &str) -> Result<Vec<(String, String)>, DirectiveError> {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut pos = 0;

    let skip_ws = |pos: &mut usize| {
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
    };

    loop {
        skip_ws(&mut pos);
        if pos >= bytes.len() {
            break;
        }

        let name_start = pos;
        let name_len = input[pos..]
            .find(|c: char| !is_name_char(c))
            .unwrap_or(input.len() - pos);
        if name_len == 0 {
            return Err(DirectiveError::Malformed(pos));
        }
        pos += name_len;
        let name = input[name_start..pos].to_ascii_lowercase();

        skip_ws(&mut pos);
        if pos >= bytes.len() || bytes[pos] != b'=' {
            attrs.push((name, String::new()));
            continue;
        }
        pos += 1;
        skip_ws(&mut pos);

        let value = match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let start = pos + 1;
                let len = input[start..]
                    .find(quote as char)
                    .ok_or(DirectiveError::Malformed(pos))?;
                pos = start + len + 1;
                &input[start..start + len]
            }
            Some(_) => {
                let start = pos;
                let len = input[start..]
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(input.len() - start);
                let raw = &input[start..start + len];
                if raw.contains(['"', '\'', '<', '=', '`']) {
                    return Err(DirectiveError::Malformed(start));
                }
                pos = start + len;
                raw
            }
            None => return Err(DirectiveError::Malformed(pos)),
        };

        attrs.push((name, html_escape::decode_html_entities(value).into_owned()));
    }

    Ok(attrs)
}

/// Distinct directive occurrences in `body`, in first-seen order.
pub fn find_directives(body: &[u8]) -> Vec<Bytes> {
    let mut seen = HashSet::new();
    DIRECTIVE_PATTERN
        .find_iter(body)
        .map(|m| m.as_bytes())
        .filter(|literal| seen.insert(*literal))
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Replace every directive whose literal text appears in `resolved`.
///
/// All replacements happen in one left-to-right pass over `body`, so text
/// introduced by one replacement is never rewritten by another in the same
/// pass. Returns the new body and the number of occurrences replaced.
pub fn substitute(body: &[u8], resolved: &HashMap<Bytes, Bytes>) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let out = DIRECTIVE_PATTERN.replace_all(body, |caps: &Captures<'_>| {
        let literal = &caps[0];
        match resolved.get(literal) {
            Some(value) => {
                replaced += 1;
                value.to_vec()
            }
            None => literal.to_vec(),
        }
    });
    (out.into_owned(), replaced)
}
