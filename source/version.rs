// Version-string helper (§4.6, "out-of-core boundary"): parses a `ceph --version`-style string
// into its numeric parts, the raw version token, and an optional build commit. No file system or
// process dependency, so there's nothing stopping it from living in-core.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
  pub parts: Vec<u64>,
  pub version_string: String,
  pub build_commit: Option<String>,
}

/// Parses `ceph ... v?MAJOR.MINOR[.PATCH][-pveN] (BUILDCOMMIT)?`. Returns `None` if no token in
/// `text` looks like a version (at least `MAJOR.MINOR`).
pub fn parse_version(text: &str) -> Option<Version> {
  for token in text.split_whitespace() {
    let candidate = token.strip_prefix('v').unwrap_or(token);
    let numeric = candidate.split('-').next().unwrap_or(candidate);
    let parts: Option<Vec<u64>> = numeric.split('.').map(|part| part.parse().ok()).collect();
    let Some(parts) = parts else { continue };
    if parts.len() < 2 {
      continue;
    }
    let build_commit = text
      .split_once('(')
      .and_then(|(_, rest)| rest.split_once(')'))
      .map(|(commit, _)| commit.to_string());
    return Some(Version { parts, version_string: token.to_string(), build_commit });
  }
  None
}
