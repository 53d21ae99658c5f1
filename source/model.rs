// The parsed representation of a Ceph-style config: an ordered mapping of section name to an
// ordered mapping of key to value. `indexmap` gives us insertion-order iteration for the parser's
// diagnostics without having to maintain a parallel key-order vector alongside a plain HashMap.

use indexmap::IndexMap;

/// A named group of key-value pairs. Keys are normalized (§4.2); values are unquoted and
/// un-escaped. Equality (and thus round-trip comparisons) is content-based, not order-based --
/// `indexmap::IndexMap`'s `PartialEq` ignores entry order.
pub type Section = IndexMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
  sections: IndexMap<String, Section>,
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.sections.is_empty()
  }

  pub fn section(&self, name: &str) -> Option<&Section> {
    self.sections.get(name)
  }

  pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
    self.sections.iter().map(|(name, section)| (name.as_str(), section))
  }

  pub fn section_names(&self) -> impl Iterator<Item = &str> {
    self.sections.keys().map(String::as_str)
  }

  /// Returns the section, creating an empty one if it didn't already exist. A section with no
  /// pairs (e.g. a header with nothing under it) is a valid, distinct entry from no section at all.
  pub fn ensure_section(&mut self, name: &str) -> &mut Section {
    self.sections.entry(name.to_string()).or_default()
  }

  /// Inserts or overwrites a key in a section, creating the section if needed. Duplicate keys
  /// within a section: last value wins (§3).
  pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
    self.ensure_section(section).insert(key.to_string(), value.into());
  }

  pub fn get(&self, section: &str, key: &str) -> Option<&str> {
    self.sections.get(section)?.get(key).map(String::as_str)
  }
}
