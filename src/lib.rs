//! # guestinfo: instance metadata from VMware guestinfo
//!
//! Facade crate that re-exports the guestinfo workspace crates so
//! consumers can depend on a single `guestinfo` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | guestinfo-core | Codecs, document parsing, host facts, merge |
//! | [`runtime`] | guestinfo-runtime | vmtoolsd transport, iproute2 probe, datasource lifecycle |
//! | [`cli`] | guestinfo-cli | Command-line front end and logging setup |

pub use guestinfo_cli as cli;
pub use guestinfo_core as core;
pub use guestinfo_runtime as runtime;
