//! Whitespace tokenizer honouring double-quoted strings.
//!
//! Tokens borrow from the input line; only quoted tokens containing
//! backslash escapes are unescaped into owned strings. The inverse
//! direction, quoting a string so it survives re-tokenization, lives here
//! too so the two stay in sync.

use std::borrow::Cow;

use simvex_core::FormatErrorKind;

#[derive(Debug, Clone)]
pub struct TokenizerConfig {
  /// Upper bound on tokens per line; more is a format error.
  pub max_tokens: usize,
}

impl Default for TokenizerConfig {
  fn default() -> Self {
    TokenizerConfig { max_tokens: 1024 }
  }
}

#[derive(Debug, Default)]
pub struct LineTokenizer {
  config: TokenizerConfig,
}

impl LineTokenizer {
  pub fn new(config: TokenizerConfig) -> Self {
    LineTokenizer { config }
  }

  /// Splits `line` on unquoted spaces and tabs. An empty result means a
  /// blank line; a first token starting with `#` marks a comment. Both are
  /// the caller's to skip.
  pub fn tokenize<'l>(&self, line: &'l str) -> Result<Vec<Cow<'l, str>>, FormatErrorKind> {
    let bytes = line.as_bytes();
    let mut tokens: Vec<Cow<'l, str>> = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
      while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
      }
      if pos >= bytes.len() {
        break;
      }
      if tokens.len() == self.config.max_tokens {
        return Err(FormatErrorKind::TooManyTokens(self.config.max_tokens));
      }
      if bytes[pos] == b'"' {
        pos += 1;
        let start = pos;
        let mut escaped = false;
        let mut has_escapes = false;
        loop {
          if pos >= bytes.len() {
            return Err(FormatErrorKind::UnterminatedQuote);
          }
          let b = bytes[pos];
          if escaped {
            escaped = false;
          } else if b == b'\\' {
            escaped = true;
            has_escapes = true;
          } else if b == b'"' {
            break;
          }
          pos += 1;
        }
        let raw = &line[start..pos];
        pos += 1;
        tokens.push(if has_escapes {
          Cow::Owned(unescape(raw))
        } else {
          Cow::Borrowed(raw)
        });
      } else {
        let start = pos;
        while pos < bytes.len() && !matches!(bytes[pos], b' ' | b'\t') {
          pos += 1;
        }
        tokens.push(Cow::Borrowed(&line[start..pos]));
      }
    }
    Ok(tokens)
  }
}

fn unescape(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut chars = raw.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      if let Some(next) = chars.next() {
        out.push(next);
      }
    } else {
      out.push(c);
    }
  }
  out
}

/// Quotes `s` so that tokenizing it back yields `s` as one token. Plain
/// tokens pass through unchanged; empty strings and strings containing
/// whitespace, quotes, backslashes or `#` get quoted and escaped.
pub fn quote_if_needed(s: &str) -> Cow<'_, str> {
  let plain = !s.is_empty() && !s.bytes().any(|b| matches!(b, b' ' | b'\t' | b'"' | b'\\' | b'#'));
  if plain {
    return Cow::Borrowed(s);
  }
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    if c == '"' || c == '\\' {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('"');
  Cow::Owned(out)
}
