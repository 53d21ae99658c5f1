// A bidirectional parser and serializer for a Ceph-style INI-like configuration format
// (https://github.com/ceph/ceph/blob/main/src/common/ConfUtils.cc), plus the small set of derived
// operations that consume parsed configurations: monitor-address aggregation, connection-option
// assembly from a storage descriptor, and keyring/secret file lifecycle management.
//
// This is a library, not a binary: there's no CLI framing, subprocess execution, or
// storage-backend logic here (those are explicit non-goals) -- callers wire this crate's
// parser/writer/connect/keyring surface into whatever storage plugin or orchestration layer needs
// it.

mod lexer;

pub mod connect;
pub mod keyring;
pub mod model;
pub mod monitor;
pub mod parser;
pub mod version;
pub mod writer;

pub use connect::{connect_options, ConnectionOptions, Paths, StorageDescriptor, StorageType};
pub use model::{Config, Section};
pub use monitor::{hostlist, monitor_addresses};
pub use parser::{parse, parse_with_diagnostics, Diagnostic};
pub use version::{parse_version, Version};
pub use writer::write;
