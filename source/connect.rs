// Connection-option assembly (§4.5): composes a connection-option record from a storage
// descriptor plus whatever keyring/config files C6 manages on disk, applying the
// managed-vs-external policy.

use crate::{keyring, monitor};
use anyhow::Context as _;
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageType {
  Rbd,
  CephFs,
}

impl StorageType {
  fn keyring_extension(self) -> &'static str {
    match self {
      StorageType::Rbd => "keyring",
      StorageType::CephFs => "secret",
    }
  }
}

/// The on-disk roots everything else is resolved against (§6). Threaded explicitly into every
/// C5/C6 entry point rather than read from an environment variable or a global.
#[derive(Clone, Debug)]
pub struct Paths {
  pub shared_conf_dir: PathBuf,
  pub priv_dir: PathBuf,
}

impl Paths {
  pub fn admin_conf_path(&self) -> PathBuf {
    self.shared_conf_dir.join("ceph.conf")
  }

  pub fn admin_keyring_path(&self) -> PathBuf {
    self.priv_dir.join("ceph.client.admin.keyring")
  }

  pub fn store_conf_path(&self, store_id: &str) -> PathBuf {
    self.priv_dir.join("ceph").join(format!("{store_id}.conf"))
  }

  pub fn keyring_path(&self, store_id: &str, ty: StorageType) -> PathBuf {
    self.priv_dir.join("ceph").join(format!("{store_id}.{}", ty.keyring_extension()))
  }
}

/// The recognized optional fields of an (externally-produced) storage descriptor. Opaque to this
/// crate beyond what §4.5 needs to assemble connection options.
#[derive(Clone, Debug, Default)]
pub struct StorageDescriptor {
  pub r#type: Option<StorageType>,
  pub monhost: Option<String>,
  pub username: Option<String>,
}

/// Short-lived, per-request output of `connect_options`. Preserves insertion order so that the
/// overlay of caller-supplied `extras` is visible in a deterministic iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
  entries: IndexMap<String, String>,
}

impl ConnectionOptions {
  fn set(&mut self, key: &str, value: impl Into<String>) {
    self.entries.insert(key.to_string(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
  }
}

/// Assembles connection options for `store_id` from `desc`, the on-disk files under `paths`, and
/// `extras` (which wins over every computed value, §4.5's last step).
///
/// A cluster is "managed" when `desc.monhost` is unset, meaning the shared `ceph.conf` is
/// authoritative; otherwise the store gets (or gets handed) its own config file. See DESIGN.md for
/// the resolution of keyring-validation failure: a shape mismatch falls back to
/// `auth_supported = none` here rather than failing the whole call, even though §7's generic
/// taxonomy entry for `KeyringShapeError` is fatal for *direct* callers of `keyring::validate`. An
/// `Io` failure (the keyring exists but can't be read) is a different matter and propagates per
/// §7's `IoError` policy.
pub fn connect_options(
  desc: &StorageDescriptor,
  store_id: &str,
  extras: &IndexMap<String, String>,
  paths: &Paths,
) -> anyhow::Result<ConnectionOptions> {
  let mut options = ConnectionOptions::default();
  let store_type = desc.r#type.unwrap_or(StorageType::Rbd);
  let keyring_path = paths.keyring_path(store_id, store_type);
  let store_conf_path = paths.store_conf_path(store_id);

  let managed = desc.monhost.is_none();
  if managed {
    options.set("ceph_conf", paths.admin_conf_path().to_string_lossy());
    if store_conf_path.exists() {
      log::warn!("{store_id}: ignoring custom ceph config, monhost not set");
    }
  } else {
    if !store_conf_path.exists() {
      keyring::create_configuration(paths, store_id)
        .with_context(|| format!("{store_id}: couldn't create a minimal ceph config"))?;
    }
    options.set("ceph_conf", store_conf_path.to_string_lossy());
  }

  if keyring_path.exists() {
    match keyring::validate(&keyring_path, store_type) {
      Ok(()) => {
        options.set("keyring", keyring_path.to_string_lossy());
        options.set("auth_supported", "cephx");
      }
      Err(error) if error.invalid_shape() => {
        log::warn!("{store_id}: {error}, falling back to unauthenticated access");
        options.set("auth_supported", "none");
      }
      Err(error) => {
        return Err(error).with_context(|| format!("{store_id}: couldn't read keyring {keyring_path:?}"));
      }
    }
  } else {
    options.set("auth_supported", "none");
  }

  options.set("userid", desc.username.as_deref().unwrap_or("admin"));
  if let Some(monhost) = &desc.monhost {
    options.set("mon_host", monitor::hostlist(monhost, ","));
  }

  for (key, value) in extras {
    options.set(key, value.clone());
  }

  Ok(options)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn paths(root: &std::path::Path) -> Paths {
    Paths { shared_conf_dir: root.join("shared"), priv_dir: root.join("priv") }
  }

  #[test]
  fn managed_cluster_uses_admin_conf_and_warns_on_custom_config() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    fs::create_dir_all(paths.priv_dir.join("ceph")).unwrap();
    fs::write(paths.store_conf_path("store"), "[global]\n").unwrap();

    let desc = StorageDescriptor::default();
    let options = connect_options(&desc, "store", &IndexMap::new(), &paths).unwrap();
    assert_eq!(Some(paths.admin_conf_path().to_string_lossy().as_ref()), options.get("ceph_conf"));
    assert_eq!(Some("admin"), options.get("userid"));
    assert_eq!(Some("none"), options.get("auth_supported"));
  }

  #[test]
  fn external_cluster_without_store_conf_gets_a_minimal_one() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    fs::create_dir_all(paths.priv_dir.join("ceph")).unwrap();

    let desc = StorageDescriptor { monhost: Some("10.0.0.1,10.0.0.2".to_string()), ..Default::default() };
    let options = connect_options(&desc, "store", &IndexMap::new(), &paths).unwrap();

    let store_conf_path = paths.store_conf_path("store");
    assert!(store_conf_path.exists());
    assert_eq!(Some(store_conf_path.to_string_lossy().as_ref()), options.get("ceph_conf"));
    assert_eq!(Some("10.0.0.1,10.0.0.2"), options.get("mon_host"));
  }

  #[test]
  fn valid_keyring_sets_cephx() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    fs::create_dir_all(paths.priv_dir.join("ceph")).unwrap();
    fs::write(
      paths.keyring_path("store", StorageType::Rbd),
      "[client.store]\n\tkey = AQD+deadbeef==\n",
    )
    .unwrap();

    let desc = StorageDescriptor::default();
    let options = connect_options(&desc, "store", &IndexMap::new(), &paths).unwrap();
    assert_eq!(Some("cephx"), options.get("auth_supported"));
    assert!(options.get("keyring").is_some());
  }

  #[test]
  fn invalid_keyring_falls_back_to_none_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    fs::create_dir_all(paths.priv_dir.join("ceph")).unwrap();
    fs::write(paths.keyring_path("store", StorageType::Rbd), "not a keyring").unwrap();

    let desc = StorageDescriptor::default();
    let options = connect_options(&desc, "store", &IndexMap::new(), &paths).unwrap();
    assert_eq!(Some("none"), options.get("auth_supported"));
    assert!(options.get("keyring").is_none());
  }

  #[test]
  fn io_failure_reading_the_keyring_propagates_instead_of_falling_back() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    // A directory where the keyring file should be: reading it fails with a real I/O error,
    // distinct from a shape mismatch.
    fs::create_dir_all(paths.keyring_path("store", StorageType::Rbd)).unwrap();

    let desc = StorageDescriptor::default();
    let error = connect_options(&desc, "store", &IndexMap::new(), &paths).unwrap_err();
    assert!(error.downcast_ref::<keyring::Error>().map(keyring::Error::io_error).unwrap_or(false));
  }

  #[test]
  fn extras_win_over_computed_values() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.shared_conf_dir).unwrap();
    fs::create_dir_all(paths.priv_dir.join("ceph")).unwrap();

    let mut extras = IndexMap::new();
    extras.insert("userid".to_string(), "override".to_string());
    let desc = StorageDescriptor::default();
    let options = connect_options(&desc, "store", &extras, &paths).unwrap();
    assert_eq!(Some("override"), options.get("userid"));
  }
}
