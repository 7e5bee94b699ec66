//! mmdb-reader: a read-only query engine for the MaxMind DB (MMDB) file
//! format.
//!
//! An MMDB file packs two things into one immutable blob: a binary search
//! tree keyed on the bits of an IP address, and a self-describing,
//! pointer-compressed data section holding one arbitrary record per
//! reachable leaf. This crate opens such a file (via mmap, plain file
//! reads, or a fully in-memory buffer), descends the tree for a given
//! address, and materializes the leaf's record as a typed [`Record`] value.
//! It also supports enumerating every `(network, record)` pair a database
//! encodes.
//!
//! This is a pure read path: there is no builder, no encoder, and no
//! network I/O anywhere in this crate. The input is always a local byte
//! source, already built by some other tool (typically `mmdbwriter` or
//! MaxMind's own tooling).
//!
//! # Quick start
//!
//! ```no_run
//! use mmdb_reader::{Reader, OpenMode};
//!
//! let reader = Reader::open("GeoLite2-City.mmdb", OpenMode::Auto)?;
//!
//! if let Some(record) = reader.get("1.1.1.1")? {
//!     println!("{:?}", record);
//! }
//!
//! for result in reader.iterate()? {
//!     let (network, record) = result?;
//!     println!("{} -> {:?}", network, record);
//! }
//! # Ok::<(), mmdb_reader::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! Reader::get(addr)
//!   -> AddressKey::try_from(addr)      normalize to packed bytes + bit length
//!   -> TreeWalker::lookup               descend the binary search tree
//!   -> Decoder::decode                  materialize the leaf's Record
//!
//! Reader::iterate()
//!   -> TreeWalker::iter                 explicit-stack depth-first walk
//!   -> Decoder::decode per leaf
//! ```
//!
//! All three layers read through one [`Buffer`](buffer::Buffer) abstraction
//! shared across the mmap, file, and in-memory access strategies, so the
//! decoder and tree walker never know which backend they're running over.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod buffer;
mod decoder;
/// Error types for mmdb-reader operations.
pub mod error;
mod metadata;
mod reader;
mod record;
mod tree;

pub use crate::address::AddressKey;
pub use crate::buffer::OpenMode;
pub use crate::error::{Error, Result};
pub use crate::metadata::{IpVersion, Metadata, RecordSize};
pub use crate::reader::{LookupAddress, Reader, ReaderGuard};
pub use crate::record::Record;
pub use crate::tree::Network;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
