// Monitor-address aggregation (§4.4). Pulls endpoints out of `global.mon_host` (handling Ceph's
// v1/v2 address-vector syntax and nonce suffixes) and every `mon.*` section's `mon_addr`. A
// v2/v1 vector pair for the same monitor differs only in messenger version and port, so both
// collapse to the single bare host they share (§8 S5).

use crate::model::Config;
use std::collections::BTreeSet;
use std::net::Ipv6Addr;

fn split_tokens(raw: &str) -> impl Iterator<Item = &str> {
  raw.split(|c: char| c == ' ' || c == ',' || c == ';').filter(|token| !token.is_empty())
}

/// Strips a leading `[?vN:` vector-form prefix, e.g. `[v2:10.0.0.1:3300` -> `10.0.0.1:3300`, or
/// `v1:10.0.0.1:6789` -> `10.0.0.1:6789`. Returns `None` if `token` doesn't match -- the caller uses
/// that to tell a vector-form token (whose port is a messenger-version artifact, not part of the
/// monitor's identity) from a plain `host[:port]` one (§8 S5: a `v2:`/`v1:` pair for the same
/// monitor collapses to a single host-only entry).
fn strip_vector_prefix(token: &str) -> Option<&str> {
  let token = token.strip_prefix('[').unwrap_or(token);
  let rest = token.strip_prefix('v')?;
  let digits = rest.chars().take_while(char::is_ascii_digit).count();
  if digits == 0 {
    return None;
  }
  rest[digits..].strip_prefix(':')
}

/// Strips a trailing `/DIGITS]?` nonce suffix, e.g. `10.0.0.1:3300/0` -> `10.0.0.1:3300`, or
/// `10.0.0.1:6789/0]` -> `10.0.0.1:6789`.
fn strip_nonce_suffix(token: &str) -> &str {
  let without_bracket = token.strip_suffix(']').unwrap_or(token);
  match without_bracket.rfind('/') {
    Some(slash) => {
      let digits = &without_bracket[slash + 1..];
      if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        &without_bracket[..slash]
      } else {
        token
      }
    }
    None => token,
  }
}

/// Parses `host[:port]`, bracketing IPv6 hosts. An unbracketed host is only split into host/port
/// at the last colon when doing so leaves a head that doesn't itself end on the `::` compression
/// marker -- otherwise splitting there would cut a bare IPv6 address (e.g. `::1`) in half instead
/// of treating it as a whole address with no port.
fn normalize_endpoint(token: &str) -> Option<String> {
  if token.is_empty() {
    return None;
  }
  if let Some(rest) = token.strip_prefix('[') {
    let (host, after) = rest.split_once(']')?;
    return Some(match after.strip_prefix(':') {
      Some(port) if !port.is_empty() => format!("[{host}]:{port}"),
      _ => format!("[{host}]"),
    });
  }
  if token.matches(':').count() <= 1 {
    return Some(token.to_string());
  }
  if let Some((head, port)) = token.rsplit_once(':') {
    if !head.ends_with(':')
      && !port.is_empty()
      && port.chars().all(|c| c.is_ascii_digit())
      && head.parse::<Ipv6Addr>().is_ok()
    {
      return Some(format!("[{head}]:{port}"));
    }
  }
  Some(format!("[{token}]"))
}

/// Strips the port off an already vector-prefix-stripped, nonce-stripped remainder, keeping only
/// the host (bracketed if IPv6). `v2:`/`v1:` entries for the same monitor differ only in messenger
/// version and port, so per §8 S5 they're folded down to the bare host they share.
fn strip_port(remainder: &str) -> Option<String> {
  if remainder.is_empty() {
    return None;
  }
  if let Some(rest) = remainder.strip_prefix('[') {
    let host = rest.split_once(']').map(|(host, _)| host).unwrap_or(rest);
    return Some(format!("[{host}]"));
  }
  if remainder.matches(':').count() <= 1 {
    let host = remainder.split_once(':').map(|(host, _)| host).unwrap_or(remainder);
    return Some(host.to_string());
  }
  if let Some((head, port)) = remainder.rsplit_once(':') {
    if !head.ends_with(':') && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
      && head.parse::<Ipv6Addr>().is_ok()
    {
      return Some(format!("[{head}]"));
    }
  }
  Some(format!("[{remainder}]"))
}

/// Normalizes one `mon_host` token. Vector-form tokens (`v1:`/`v2:` prefixed) drop their port and
/// collapse to a bare host, matching the worked example in §8 S5; everything else goes through
/// `normalize_endpoint`, which keeps the port.
fn normalize_token(token: &str) -> Option<String> {
  match strip_vector_prefix(token) {
    Some(remainder) => strip_port(strip_nonce_suffix(remainder)),
    None => normalize_endpoint(strip_nonce_suffix(token)),
  }
}

/// Splits a free-form, delimiter-separated endpoint list and re-emits normalized endpoints joined
/// by `sep`. The shared routine `monitor_addresses` is itself built from.
pub fn hostlist(list: &str, sep: &str) -> String {
  split_tokens(list).filter_map(normalize_token).collect::<Vec<_>>().join(sep)
}

/// Aggregates and deduplicates every monitor endpoint findable in `cfg`: `global.mon_host` (split,
/// vector/nonce-stripped, normalized) plus every `mon.*` section's verbatim `mon_addr`. Empty if
/// there are no monitors. Stable under `parse(write(cfg))` round-trips.
pub fn monitor_addresses(cfg: &Config) -> String {
  let mut endpoints: BTreeSet<String> = BTreeSet::new();

  if let Some(global) = cfg.section("global") {
    if let Some(mon_host) = global.get("mon_host") {
      for token in split_tokens(mon_host) {
        if let Some(endpoint) = normalize_token(token) {
          endpoints.insert(endpoint);
        }
      }
    }
  }

  for (name, section) in cfg.sections() {
    if !name.starts_with("mon.") {
      continue;
    }
    if let Some(addr) = section.get("mon_addr") {
      if !addr.is_empty() {
        endpoints.insert(addr.to_string());
      }
    }
  }

  endpoints.into_iter().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::Config, parser, writer};

  #[test]
  fn no_monitors_is_empty() {
    assert_eq!("", monitor_addresses(&Config::new()));
  }

  #[test]
  fn combines_global_mon_host_and_mon_sections() {
    let mut cfg = Config::new();
    cfg.set("global", "mon_host", "10.0.0.1 10.0.0.2");
    cfg.set("mon.a", "mon_addr", "10.0.0.3:6789");
    assert_eq!("10.0.0.1,10.0.0.2,10.0.0.3:6789", monitor_addresses(&cfg));
  }

  #[test]
  fn deduplicates_endpoints() {
    let mut cfg = Config::new();
    cfg.set("global", "mon_host", "10.0.0.1,10.0.0.1;10.0.0.1");
    assert_eq!("10.0.0.1", monitor_addresses(&cfg));
  }

  #[test]
  fn vector_form_tokens_drop_their_port_and_collapse_to_a_bare_host() {
    assert_eq!(Some("10.0.0.1".to_string()), normalize_token("[v2:10.0.0.1:3300/0"));
    assert_eq!(Some("10.0.0.1".to_string()), normalize_token("v1:10.0.0.1:6789/0]"));
  }

  #[test]
  fn matches_the_spec_s5_worked_example() {
    // global.mon_host = "[v2:10.0.0.1:3300/0,v1:10.0.0.1:6789/0] ::1 2001:db8::1:6789",
    // mon.a.mon_addr = "10.0.0.2:6789" -- the v2/v1 pair for 10.0.0.1 collapses to one host-only
    // entry, so the deduplicated, sorted set has four members, not five.
    let mut cfg = Config::new();
    cfg.set("global", "mon_host", "[v2:10.0.0.1:3300/0,v1:10.0.0.1:6789/0] ::1 2001:db8::1:6789");
    cfg.set("mon.a", "mon_addr", "10.0.0.2:6789");
    assert_eq!("10.0.0.1,10.0.0.2:6789,[2001:db8::1]:6789,[::1]", monitor_addresses(&cfg));
  }

  #[test]
  fn bare_ipv6_loopback_keeps_no_port() {
    assert_eq!(Some("[::1]".to_string()), normalize_endpoint("::1"));
  }

  #[test]
  fn ipv6_with_trailing_numeric_segment_is_treated_as_a_port() {
    assert_eq!(
      Some("[2001:db8::1]:6789".to_string()),
      normalize_endpoint("2001:db8::1:6789")
    );
  }

  #[test]
  fn bracketed_ipv6_passes_through() {
    assert_eq!(Some("[::1]:6789".to_string()), normalize_endpoint("[::1]:6789"));
    assert_eq!(Some("[::1]".to_string()), normalize_endpoint("[::1]"));
  }

  #[test]
  fn hostlist_joins_with_caller_separator() {
    assert_eq!("10.0.0.1;10.0.0.2", hostlist("10.0.0.1,10.0.0.2", ";"));
  }

  #[test]
  fn stable_under_round_trip() {
    let mut cfg = Config::new();
    cfg.set("global", "mon_host", "[v2:10.0.0.1:3300/0,v1:10.0.0.1:6789/0] ::1 2001:db8::1:6789");
    cfg.set("mon.a", "mon_addr", "10.0.0.2:6789");
    let before = monitor_addresses(&cfg);
    let reparsed = parser::parse(&writer::write(&cfg));
    assert_eq!(before, monitor_addresses(&reparsed));
  }
}
