// guestinfo-core: decode, parse, collect, resolve, merge
// No process or OS access; host state comes in through the traits below.

pub mod codec;
pub mod document;
pub mod error;
pub mod facts;
pub mod merge;
pub mod parser;
pub mod resolver;

pub use document::MetadataDocument;
pub use error::{Error, Result};
pub use facts::{AddressFamily, AddressRecord, HostFacts, InterfaceFact, NetworkProbe};
pub use resolver::{GuestInfoSource, RawValue};
