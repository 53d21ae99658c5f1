// Keyring/secret file lifecycle (§4.6): create, copy, remove, and validate keyring or secret
// files with strict permissions. File creation uses exclusive semantics -- refuses to overwrite
// an existing file except where §4.6 explicitly asks for a truncating write (an explicit secret).

use crate::{
  connect::{Paths, StorageType},
  model, parser, writer,
};
use anyhow::Context as _;
use base64::Engine as _;
use std::{
  error, fmt, fs,
  io::{self, Write as _},
  os::unix::fs::PermissionsExt as _,
  path::{Path, PathBuf},
};
use zeroize::Zeroize as _;

const KEYRING_MODE: u32 = 0o400;
const CONFIG_MODE: u32 = 0o600;

/// Small, inspectable error enum mirroring `notmuch::Error`'s shape: predicate methods let callers
/// pattern-match on a specific recoverable condition instead of string-matching a message.
#[derive(Debug)]
pub enum Error {
  AlreadyExists(PathBuf),
  InvalidShape { path: PathBuf, expected: StorageType },
  Io { path: PathBuf, source: io::Error },
}

impl Error {
  pub fn already_exists(&self) -> bool {
    matches!(self, Error::AlreadyExists(_))
  }

  pub fn invalid_shape(&self) -> bool {
    matches!(self, Error::InvalidShape { .. })
  }

  /// A filesystem failure distinct from a shape mismatch (§7: `IoError`, not `KeyringShapeError`).
  /// A caller like `connect::connect_options` that falls back to unauthenticated access on a
  /// malformed keyring must not do the same here -- a permission-denied or transient read failure
  /// is not evidence the file isn't a real keyring.
  pub fn io_error(&self) -> bool {
    matches!(self, Error::Io { .. })
  }
}

impl fmt::Display for Error {
  fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::AlreadyExists(path) => write!(formatter, "{path:?} already exists"),
      Error::InvalidShape { path, expected } => {
        let kind = match expected {
          StorageType::Rbd => "rbd keyring",
          StorageType::CephFs => "cephfs secret",
        };
        write!(formatter, "{path:?} is not a proper {kind} authentication file")
      }
      Error::Io { path, source } => write!(formatter, "couldn't read {path:?}: {source}"),
    }
  }
}

impl error::Error for Error {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      Error::Io { source, .. } => Some(source),
      Error::AlreadyExists(_) | Error::InvalidShape { .. } => None,
    }
  }
}

// The normative shape check (§4.6) is just "ends in ==". A token that also fails to decode as
// base64 is almost certainly not a real Ceph key either way, but the spec doesn't make that a
// rejection criterion, so it's logged rather than enforced.
fn warn_if_not_base64(path: &Path, token: &str) {
  if base64::engine::general_purpose::STANDARD.decode(token).is_err() {
    log::debug!("{path:?}: key doesn't decode as base64 despite matching the expected shape");
  }
}

/// A proper rbd keyring needs at least one `[IDENT]` block whose `key` ends in `==` (§4.6) --
/// not necessarily the *last* section in the file, since a trailing section with no `key` entry
/// of its own (e.g. a second identity block appended after the one that matters) shouldn't sink an
/// otherwise valid keyring. Scans from the end so the most recently written block wins on ties.
fn validate_rbd_shape(path: &Path, contents: &str) -> bool {
  let config = parser::parse(contents);
  let sections: Vec<_> = config.sections().collect();
  let key = sections
    .iter()
    .rev()
    .find_map(|(_, section)| section.get("key").filter(|key| !key.is_empty() && key.ends_with("==")));
  match key {
    Some(key) => {
      warn_if_not_base64(path, key);
      true
    }
    None => false,
  }
}

fn validate_cephfs_shape(path: &Path, contents: &str) -> bool {
  match contents.lines().rev().find(|line| !line.trim().is_empty()) {
    Some(line) if line.trim().ends_with("==") => {
      warn_if_not_base64(path, line.trim());
      true
    }
    _ => false,
  }
}

/// Validates that `path` looks like a proper rbd keyring or cephfs secret (§4.6). A caller with no
/// further use for the error besides surfacing it should propagate it as-is; `connect::connect_options`
/// instead treats a shape mismatch as non-fatal (see its doc comment and DESIGN.md) but still
/// propagates an `Io` failure, per §7's `IoError` policy.
pub fn validate(path: &Path, ty: StorageType) -> Result<(), Error> {
  let contents = fs::read_to_string(path)
    .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
  let ok = match ty {
    StorageType::Rbd => validate_rbd_shape(path, &contents),
    StorageType::CephFs => validate_cephfs_shape(path, &contents),
  };
  if ok {
    Ok(())
  } else {
    Err(Error::InvalidShape { path: path.to_path_buf(), expected: ty })
  }
}

fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Runs `write`, creating `dest`'s parent directory first; on failure, deletes `dest` before
/// re-raising so a partial write never lingers (§7).
fn write_guarded(dest: &Path, write: impl FnOnce(&Path) -> anyhow::Result<()>) -> anyhow::Result<()> {
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).with_context(|| format!("couldn't create {parent:?}"))?;
  }
  match write(dest) {
    Ok(()) => {
      log::info!("created {dest:?}");
      Ok(())
    }
    Err(error) => {
      let _ = fs::remove_file(dest);
      Err(error).with_context(|| format!("couldn't create {dest:?}"))
    }
  }
}

fn write_secret_file(dest: &Path, secret: &str) -> anyhow::Result<()> {
  let mut file = fs::File::create(dest)?;
  file.write_all(secret.as_bytes())?;
  file.write_all(b"\n")?;
  file.sync_all()?;
  set_permissions(dest, KEYRING_MODE)?;
  Ok(())
}

/// Creates the per-store keyring (rbd) or secret (cephfs) file. With `secret` given, writes it
/// verbatim (truncating any existing file deliberately). Without one: for rbd, copies
/// `ADMIN_KEYRING`; for cephfs, extracts `client.admin`'s `key` out of it. Either way, a missing
/// admin keyring is a warning, not a failure (§7 `MissingAdminKeyringError`): authentication is
/// simply left disabled for this store.
pub fn create_keyfile(
  paths: &Paths,
  store_id: &str,
  ty: StorageType,
  secret: Option<&str>,
) -> anyhow::Result<()> {
  let dest = paths.keyring_path(store_id, ty);
  if dest.exists() && secret.is_none() {
    anyhow::bail!(Error::AlreadyExists(dest));
  }

  if let Some(secret) = secret {
    return write_guarded(&dest, |dest| write_secret_file(dest, secret));
  }

  let admin_keyring = paths.admin_keyring_path();
  if !admin_keyring.exists() {
    log::warn!("{admin_keyring:?} missing, authentication is disabled for {store_id}");
    return Ok(());
  }

  match ty {
    StorageType::Rbd => write_guarded(&dest, |dest| {
      fs::copy(&admin_keyring, dest).with_context(|| format!("couldn't copy {admin_keyring:?}"))?;
      set_permissions(dest, KEYRING_MODE)?;
      Ok(())
    }),
    StorageType::CephFs => {
      let contents = fs::read_to_string(&admin_keyring)
        .with_context(|| format!("couldn't read {admin_keyring:?}"))?;
      let config = parser::parse(&contents);
      let mut secret = config
        .get("client.admin", "key")
        .with_context(|| format!("client.admin/key missing from {admin_keyring:?}"))?
        .to_string();
      let result = write_guarded(&dest, |dest| write_secret_file(dest, &secret));
      secret.zeroize();
      result
    }
  }
}

fn remove_idempotent(path: &Path) {
  match fs::remove_file(path) {
    Ok(()) => log::info!("removed {path:?}"),
    Err(error) if error.kind() == io::ErrorKind::NotFound => (),
    Err(error) => log::warn!("couldn't remove {path:?}: {error}"),
  }
}

/// Idempotent: removing an already-absent keyring/secret is not an error.
pub fn remove_keyfile(paths: &Paths, store_id: &str, ty: StorageType) {
  remove_idempotent(&paths.keyring_path(store_id, ty));
}

/// Creates a minimal per-store config (`[global]` with `keyring = KEYRING_PATH`), rbd only. A
/// no-op (with a warning) if one already exists -- this never overwrites a caller's custom config.
pub fn create_configuration(paths: &Paths, store_id: &str) -> anyhow::Result<()> {
  let dest = paths.store_conf_path(store_id);
  if dest.exists() {
    log::warn!("{dest:?} already exists, leaving it alone");
    return Ok(());
  }
  let mut config = model::Config::new();
  config.set("global", "keyring", paths.keyring_path(store_id, StorageType::Rbd).to_string_lossy());
  let text = writer::write(&config);
  write_guarded(&dest, |dest| {
    let mut file = fs::File::create(dest)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;
    set_permissions(dest, CONFIG_MODE)?;
    Ok(())
  })
}

/// Idempotent sibling of `remove_keyfile` for the minimal per-store config (§B).
pub fn remove_configuration(paths: &Paths, store_id: &str) {
  remove_idempotent(&paths.store_conf_path(store_id));
}
