//! Reference tokens: parsing and substitution of cross-resource references.
//!
//! A resource refers to a field of another resource's remote description by
//! embedding a token anywhere in its payload text. Tokens are resolved at
//! deploy time, once the target has been deployed and its remote id is known.
//!
//! # Token Format
//!
//! `__@@<type>||<id>||<field>@@__`, for example
//! `__@@page||syllabus-notes||url@@__`.
//!
//! The three parts must be non-empty and neither may contain `||` or `@@`.
//! Anything between the markers that does not split into exactly three such
//! parts is ordinary text and passes through unchanged.
//!
//! # Example
//!
//! ```
//! use coursesync_lib::token::{format, scan};
//!
//! let text = format!("See <a href=\"{}\">notes</a>", format("page", "notes", "url"));
//! let tokens = scan(&text);
//! assert_eq!(tokens.len(), 1);
//! assert_eq!(tokens[0].rtype, "page");
//! assert_eq!(tokens[0].field, "url");
//! ```

use thiserror::Error;

use crate::resource::ResourceKey;

pub const TOKEN_OPEN: &str = "__@@";
pub const TOKEN_CLOSE: &str = "@@__";
pub const TOKEN_SEPARATOR: &str = "||";

/// A reference token found in a text, borrowing from that text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
  pub rtype: &'a str,
  pub id: &'a str,
  pub field: &'a str,
  /// Byte offset of the opening marker.
  pub start: usize,
  /// Byte offset one past the closing marker.
  pub end: usize,
}

impl Token<'_> {
  pub fn key(&self) -> ResourceKey {
    ResourceKey::new(self.rtype, self.id)
  }
}

/// Errors that can occur while substituting tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
  #[error("reference to unknown resource {rtype}:{id}")]
  UnknownTarget { rtype: String, id: String },

  #[error("resource {rtype}:{id} has no value for field '{field}'")]
  MissingField { rtype: String, id: String, field: String },
}

/// Resolves the value a token stands for.
pub trait Resolver {
  fn resolve(&self, rtype: &str, id: &str, field: &str) -> Result<String, TokenError>;
}

/// Render a token.
pub fn format(rtype: &str, id: &str, field: &str) -> String {
  format!("{TOKEN_OPEN}{rtype}{TOKEN_SEPARATOR}{id}{TOKEN_SEPARATOR}{field}{TOKEN_CLOSE}")
}

/// Find every well-formed token in `text`, in order of appearance.
pub fn scan(text: &str) -> Vec<Token<'_>> {
  let mut tokens = Vec::new();
  let mut pos = 0;

  while let Some(offset) = text[pos..].find(TOKEN_OPEN) {
    let start = pos + offset;
    let inner_start = start + TOKEN_OPEN.len();

    let Some(close) = text[inner_start..].find(TOKEN_CLOSE) else {
      break;
    };
    let inner_end = inner_start + close;

    match parse_inner(&text[inner_start..inner_end]) {
      Some((rtype, id, field)) => {
        let end = inner_end + TOKEN_CLOSE.len();
        tokens.push(Token {
          rtype,
          id,
          field,
          start,
          end,
        });
        pos = end;
      }
      // Not a token; a later opening marker may still start one.
      None => pos = start + 1,
    }
  }

  tokens
}

fn parse_inner(inner: &str) -> Option<(&str, &str, &str)> {
  let mut parts = inner.split(TOKEN_SEPARATOR);
  let rtype = parts.next()?;
  let id = parts.next()?;
  let field = parts.next()?;
  if parts.next().is_some() {
    return None;
  }
  let valid = |part: &str| !part.is_empty() && !part.contains("@@");
  (valid(rtype) && valid(id) && valid(field)).then_some((rtype, id, field))
}

/// Unique resources referenced by `text`, in order of first appearance.
pub fn references(text: &str) -> Vec<ResourceKey> {
  let mut keys: Vec<ResourceKey> = Vec::new();
  for token in scan(text) {
    let key = token.key();
    if !keys.contains(&key) {
      keys.push(key);
    }
  }
  keys
}

/// Substitute every token in `text` using the provided resolver.
///
/// Resolved values are inserted verbatim.
///
/// # Errors
///
/// Returns the first resolution failure.
pub fn substitute(text: &str, resolver: &impl Resolver) -> Result<String, TokenError> {
  let mut result = String::with_capacity(text.len());
  let mut last = 0;

  for token in scan(text) {
    result.push_str(&text[last..token.start]);
    result.push_str(&resolver.resolve(token.rtype, token.id, token.field)?);
    last = token.end;
  }
  result.push_str(&text[last..]);

  Ok(result)
}
