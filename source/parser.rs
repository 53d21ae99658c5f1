// https://github.com/ceph/ceph/blob/main/src/common/ConfUtils.cc - the grammar this is compatible
// with: quoted/unquoted values, comments introduced by ';' or '#' (escapable), line continuations,
// and whitespace-squeezed keys.

use crate::{lexer, model::Config};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
  MissingSeparator,
  OrphanKey,
  MalformedHeader,
  EmptyKey,
  UnterminatedQuote,
  TrailingContentAfterQuote,
}

impl DiagnosticKind {
  fn reason(self) -> &'static str {
    match self {
      DiagnosticKind::MissingSeparator => "missing '=' separator",
      DiagnosticKind::OrphanKey => "key-value pair outside of any section",
      DiagnosticKind::MalformedHeader => "malformed section header",
      DiagnosticKind::EmptyKey => "key normalizes to an empty string",
      DiagnosticKind::UnterminatedQuote => "unterminated quoted value",
      DiagnosticKind::TrailingContentAfterQuote => "trailing content after a quoted value",
    }
  }
}

/// A recoverable per-line parse failure (§7). The parser never panics and never aborts on these;
/// it records one of these, skips the offending line, and keeps going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
  pub kind: DiagnosticKind,
  pub line: usize,
  pub text: String,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(formatter, "line {}: {} ({:?})", self.line, self.kind.reason(), self.text)
  }
}

struct LineQueue<'a> {
  lines: &'a [&'a str],
  pos: usize,
}

impl<'a> LineQueue<'a> {
  fn new(lines: &'a [&'a str]) -> Self {
    Self { lines, pos: 0 }
  }

  fn next(&mut self) -> Option<(usize, &'a str)> {
    let line = *self.lines.get(self.pos)?;
    self.pos += 1;
    Some((self.pos, line))
  }
}

/// Joins continuation physical lines into one logical line, stripping a trailing comment from
/// each physical line as it's consumed. Returns the 1-based line number the logical line started
/// on, and the joined text.
fn read_logical_line<'a>(queue: &mut LineQueue<'a>) -> Option<(usize, String)> {
  let (line_no, first) = queue.next()?;
  let mut current = lexer::strip_trailing_comment(first).to_string();
  while lexer::ends_with_unescaped_backslash(&current) {
    current.pop();
    match queue.next() {
      Some((_, next)) => current.push_str(lexer::strip_trailing_comment(next.trim_start())),
      None => break,
    }
  }
  Some((line_no, current))
}

fn normalize_key(raw: &str) -> String {
  let trimmed = raw.trim();
  let mut collapsed = String::with_capacity(trimmed.len());
  let mut pending_space = false;
  for ch in trimmed.chars() {
    if ch.is_whitespace() {
      pending_space = true;
      continue;
    }
    if pending_space {
      collapsed.push(' ');
      pending_space = false;
    }
    collapsed.push(ch);
  }
  let underscored: String = collapsed.chars().map(|c| if c == ' ' { '_' } else { c }).collect();
  lexer::unescape_comment_literals(&underscored)
}

fn parse_header(text: &str) -> Result<String, DiagnosticKind> {
  let rest = text.strip_prefix('[').expect("caller checked leading '['");
  let (name, stop) = lexer::scan_field(rest, |c| c == ']');
  let (idx, _) = stop.ok_or(DiagnosticKind::MalformedHeader)?;
  let trailing = &rest[idx + 1..];
  if !trailing.trim().is_empty() {
    return Err(DiagnosticKind::MalformedHeader);
  }
  let name = lexer::unescape_comment_literals(&name);
  if name.is_empty() {
    return Err(DiagnosticKind::MalformedHeader);
  }
  Ok(name)
}

fn parse_quoted_value(text: &str, quote: char) -> Result<String, DiagnosticKind> {
  let (content, stop) = lexer::scan_field(text, |c| c == quote || lexer::is_comment(c));
  match stop {
    Some((idx, c)) if c == quote => {
      let trailing = &text[idx + 1..];
      if !trailing.trim().is_empty() {
        return Err(DiagnosticKind::TrailingContentAfterQuote);
      }
      Ok(lexer::unescape_comment_literals(&content))
    }
    _ => Err(DiagnosticKind::UnterminatedQuote),
  }
}

fn parse_value(text: &str) -> Result<String, DiagnosticKind> {
  match text.chars().next() {
    Some(quote @ ('\'' | '"')) => parse_quoted_value(&text[1..], quote),
    _ => {
      let (content, _) = lexer::scan_field(text, |_| false);
      Ok(lexer::unescape_comment_literals(content.trim_end()))
    }
  }
}

fn parse_key_value(text: &str, section: Option<&str>) -> Result<(String, String), DiagnosticKind> {
  section.ok_or(DiagnosticKind::OrphanKey)?;
  let (raw_key, stop) = lexer::scan_field(text, |c| c == '=');
  let (idx, _) = stop.ok_or(DiagnosticKind::MissingSeparator)?;
  let key = normalize_key(&raw_key);
  if key.is_empty() {
    return Err(DiagnosticKind::EmptyKey);
  }
  let value = parse_value(text[idx + 1..].trim_start())?;
  Ok((key, value))
}

/// Parses `raw` into a `Config`, returning every recoverable diagnostic alongside it. Never panics
/// (§8): malformed lines are skipped, not fatal.
pub fn parse_with_diagnostics(raw: &str) -> (Config, Vec<Diagnostic>) {
  let physical_lines: Vec<&str> = raw.split('\n').collect();
  let mut queue = LineQueue::new(&physical_lines);
  let mut config = Config::new();
  let mut current_section: Option<String> = None;
  let mut diagnostics = Vec::new();

  while let Some((line_no, logical)) = read_logical_line(&mut queue) {
    let trimmed = logical.trim();
    if trimmed.is_empty() || trimmed == "\\" {
      continue;
    }
    let left_trimmed = logical.trim_start();
    if left_trimmed.starts_with('[') {
      match parse_header(left_trimmed) {
        Ok(name) => {
          config.ensure_section(&name);
          current_section = Some(name);
        }
        Err(kind) => {
          diagnostics.push(Diagnostic { kind, line: line_no, text: logical.clone() });
          current_section = None;
        }
      }
    } else {
      match parse_key_value(left_trimmed, current_section.as_deref()) {
        Ok((key, value)) => config.set(current_section.as_ref().unwrap(), &key, value),
        Err(kind) => diagnostics.push(Diagnostic { kind, line: line_no, text: logical.clone() }),
      }
    }
  }

  (config, diagnostics)
}

/// Convenience entry point: parses `raw` and logs any diagnostic at `warn!` (§A.1). Callers that
/// want to inspect diagnostics programmatically should use `parse_with_diagnostics` instead.
pub fn parse(raw: &str) -> Config {
  let (config, diagnostics) = parse_with_diagnostics(raw);
  for diagnostic in &diagnostics {
    log::warn!("{diagnostic}");
  }
  config
}
