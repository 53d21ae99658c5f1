// Serializes a Config back to the Ceph grammar (§4.3): fixed section-priority ordering,
// lexicographic key ordering within a section, and a single whole-text escape pass at the end.

use crate::model::Config;
use std::collections::HashSet;

const PRIORITY: &[&str] = &["global", "client", "mds", "mon", "osd", "mgr"];

/// Re-escapes unescaped `;`/`#` in the already-assembled output. The look-behind is a single
/// preceding character, not an escape-parity count: `\;` stays single-escaped, but a literal
/// backslash immediately before a comment char (e.g. from an escaped backslash, `\\;`) also counts
/// as "already escaped" and is left alone. This mirrors the quirk called out in the original
/// source's escaping pass and must not be "fixed" into a parity-aware version.
fn escape_comment_literals(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut previous: Option<char> = None;
  for ch in text.chars() {
    if crate::lexer::is_comment(ch) && previous != Some('\\') {
      out.push('\\');
    }
    out.push(ch);
    previous = Some(ch);
  }
  out
}

/// Serializes `cfg` to canonical text. Deterministic: the same `Config` always produces the same
/// bytes, regardless of parse/insertion order.
pub fn write(cfg: &Config) -> String {
  let mut emitted: HashSet<&str> = HashSet::new();
  let mut order: Vec<&str> = Vec::new();

  for prefix in PRIORITY {
    if cfg.section(prefix).is_some() && emitted.insert(prefix) {
      order.push(prefix);
    }
    let dotted_prefix = format!("{prefix}.");
    let mut group: Vec<&str> = cfg
      .section_names()
      .filter(|name| name.starts_with(&dotted_prefix) && !emitted.contains(name))
      .collect();
    group.sort_unstable();
    for name in group {
      emitted.insert(name);
      order.push(name);
    }
  }

  let mut rest: Vec<&str> = cfg.section_names().filter(|name| !emitted.contains(name)).collect();
  rest.sort_unstable();
  order.extend(rest);

  let mut out = String::new();
  for name in order {
    let section = cfg.section(name).expect("name came from cfg.section_names()");
    out.push('[');
    out.push_str(name);
    out.push_str("]\n");
    let mut keys: Vec<&str> = section.keys().map(String::as_str).collect();
    keys.sort_unstable();
    for key in keys {
      let value = section.get(key).expect("key came from section.keys()");
      out.push('\t');
      out.push_str(key);
      out.push_str(" = ");
      out.push_str(value);
      out.push('\n');
    }
    out.push('\n');
  }
  escape_comment_literals(&out)
}
