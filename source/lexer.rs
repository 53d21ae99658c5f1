// Character classes and escape handling shared by the parser and writer.
//
// A backslash followed by any single character yields that character literally, except that an
// escaped comment literal (`\;`, `\#`) is left untouched here and resolved later, in a single pass,
// by `unescape_comment_literals`. This lets comment-stripping (which must not be fooled by an
// escaped `;`/`#`) and field scanning share the same escape-skipping logic.

pub fn is_comment(c: char) -> bool {
  c == ';' || c == '#'
}

/// Scans `text` from the start, resolving `\X` escapes as it goes (except comment literals, which
/// are left as the literal two-character pair for `unescape_comment_literals` to resolve later),
/// until an unescaped character satisfies `stop`. Returns the resolved text and, if a stop
/// character was found, its byte offset (into `text`) and the character itself.
pub fn scan_field(text: &str, stop: impl Fn(char) -> bool) -> (String, Option<(usize, char)>) {
  let mut result = String::with_capacity(text.len());
  let mut chars = text.char_indices().peekable();
  while let Some(&(idx, ch)) = chars.peek() {
    if ch == '\\' {
      chars.next();
      match chars.peek().copied() {
        Some((_, escaped)) => {
          chars.next();
          if is_comment(escaped) {
            result.push('\\');
            result.push(escaped);
          } else {
            result.push(escaped);
          }
        }
        None => result.push('\\'),
      }
      continue;
    }
    if stop(ch) {
      return (result, Some((idx, ch)));
    }
    result.push(ch);
    chars.next();
  }
  (result, None)
}

/// Resolves escaped comment literals (`\;` -> `;`, `\#` -> `#`) left unresolved by `scan_field`.
/// A single left-to-right pass: each `\;`/`\#` pair is consumed once and cannot be re-escaped by a
/// following pass, matching the writer's inverse operation in `writer::escape_comment_literals`.
pub fn unescape_comment_literals(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();
  while let Some(c) = chars.next() {
    if c == '\\' {
      if let Some(&next) = chars.peek() {
        if is_comment(next) {
          out.push(next);
          chars.next();
          continue;
        }
      }
      out.push('\\');
      continue;
    }
    out.push(c);
  }
  out
}

/// Truncates `line` at the first unescaped comment character, skipping escape pairs as it goes.
/// Already-escaped `\;`/`\#` survive intact in the returned slice (they're resolved later by
/// `unescape_comment_literals`, once the field they belong to has been identified).
pub fn strip_trailing_comment(line: &str) -> &str {
  let mut chars = line.char_indices().peekable();
  while let Some(&(idx, ch)) = chars.peek() {
    if ch == '\\' {
      chars.next();
      chars.next();
      continue;
    }
    if is_comment(ch) {
      return &line[..idx];
    }
    chars.next();
  }
  line
}

/// True if `s` ends with a single unescaped backslash, i.e. an odd run of trailing backslashes.
/// A `\\` pair at the end is an escaped (literal) backslash, not a continuation marker.
pub fn ends_with_unescaped_backslash(s: &str) -> bool {
  let count = s.chars().rev().take_while(|&c| c == '\\').count();
  count % 2 == 1
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scan_field_resolves_non_comment_escapes() {
    let (text, stop) = scan_field(r"fo\=o=bar", |c| c == '=');
    assert_eq!("fo=o", text);
    assert_eq!(Some((4, '=')), stop);
  }

  #[test]
  fn scan_field_defers_comment_escapes() {
    let (text, stop) = scan_field(r"1\;1'", |c| c == '\'');
    assert_eq!(r"1\;1", text);
    assert_eq!(Some((4, '\'')), stop);
  }

  #[test]
  fn unescape_resolves_comment_literals_only() {
    assert_eq!("1;1", unescape_comment_literals(r"1\;1"));
    assert_eq!("2#2", unescape_comment_literals(r"2\#2"));
    assert_eq!(r"o\=o", unescape_comment_literals(r"o\=o"));
  }

  #[test]
  fn strip_trailing_comment_skips_escaped_markers() {
    assert_eq!(r"foo\;bar", strip_trailing_comment(r"foo\;bar ; a real comment"));
    assert_eq!("foo", strip_trailing_comment("foo # comment"));
    assert_eq!("foo", strip_trailing_comment("foo"));
  }

  #[test]
  fn continuation_detection_is_parity_aware() {
    assert!(ends_with_unescaped_backslash(r"foo\"));
    assert!(!ends_with_unescaped_backslash(r"foo\\"));
    assert!(ends_with_unescaped_backslash(r"foo\\\"));
    assert!(!ends_with_unescaped_backslash("foo"));
  }
}
