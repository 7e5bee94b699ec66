//! Public query surface: `open`, `get`, `get_with_prefix_len`, `iterate`,
//! lifecycle. Everything upstream (`AddressKey`, `TreeWalker`, `Decoder`,
//! `Metadata`) is an implementation detail a caller never touches directly.

use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::atomic::AtomicU32;

use crate::address::AddressKey;
use crate::buffer::{Buffer, OpenMode};
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::metadata::{IpVersion, Metadata};
use crate::record::Record;
use crate::tree::{Network, TreeWalker, IPV4_START_UNSET};

/// Anything `Reader::get`/`get_with_prefix_len` can accept as a lookup key:
/// textual addresses and pre-parsed `std::net` address types, matching the
/// reference reader's "text or pre-parsed address object" input.
pub trait LookupAddress {
    /// Normalize `self` into a packed lookup key.
    fn into_address_key(self) -> Result<AddressKey>;
}

impl LookupAddress for AddressKey {
    fn into_address_key(self) -> Result<AddressKey> {
        Ok(self)
    }
}

impl LookupAddress for &AddressKey {
    fn into_address_key(self) -> Result<AddressKey> {
        Ok(self.clone())
    }
}

impl LookupAddress for IpAddr {
    fn into_address_key(self) -> Result<AddressKey> {
        Ok(self.into())
    }
}

impl LookupAddress for Ipv4Addr {
    fn into_address_key(self) -> Result<AddressKey> {
        Ok(self.into())
    }
}

impl LookupAddress for Ipv6Addr {
    fn into_address_key(self) -> Result<AddressKey> {
        Ok(self.into())
    }
}

impl LookupAddress for &str {
    fn into_address_key(self) -> Result<AddressKey> {
        AddressKey::try_from(self)
    }
}

impl LookupAddress for &String {
    fn into_address_key(self) -> Result<AddressKey> {
        AddressKey::try_from(self.as_str())
    }
}

impl LookupAddress for String {
    fn into_address_key(self) -> Result<AddressKey> {
        AddressKey::try_from(self)
    }
}

/// A read-only handle onto an open MMDB-format database.
///
/// Every operation is synchronous and reentrant; `Reader` is `Send + Sync`
/// and safe to share across threads (see the crate-level concurrency notes
/// on `close`). There is no internal cache and no background work: a
/// lookup does exactly the tree descent and data-section decode the query
/// requires, nothing more.
pub struct Reader {
    buffer: Buffer,
    metadata: Metadata,
    data_section_offset: usize,
    ipv4_start: AtomicU32,
}

impl Reader {
    /// Open `path` under the given access strategy.
    ///
    /// # Examples
    /// ```no_run
    /// use mmdb_reader::{Reader, OpenMode};
    ///
    /// let reader = Reader::open("GeoLite2-City.mmdb", OpenMode::Auto)?;
    /// let record = reader.get("1.1.1.1")?;
    /// # Ok::<(), mmdb_reader::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::from_buffer(Buffer::open(path.as_ref(), mode)?)
    }

    /// Build a Reader over an in-memory byte vector (the MEMORY source kind).
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_buffer(Buffer::from_bytes(data))
    }

    /// Build a Reader over an already-open file descriptor. FD mode implies
    /// MEMORY: the source is read to completion and the descriptor is not
    /// retained past this call.
    pub fn from_fd(file: File) -> Result<Self> {
        Self::from_buffer(Buffer::from_file(file)?)
    }

    fn from_buffer(buffer: Buffer) -> Result<Self> {
        let (metadata, data_section_offset) = Metadata::parse(&buffer)?;
        Ok(Reader {
            buffer,
            metadata,
            data_section_offset,
            ipv4_start: AtomicU32::new(IPV4_START_UNSET),
        })
    }

    /// Look up `addr`, discarding the matched prefix length.
    pub fn get<A: LookupAddress>(&self, addr: A) -> Result<Option<Record>> {
        Ok(self.get_with_prefix_len(addr)?.0)
    }

    /// Look up `addr`, returning the record (if the prefix is assigned) and
    /// the number of bits consumed when descent stopped. If descent stopped
    /// because the prefix is unassigned, the record is `None` but
    /// `prefix_len` still reports how deep the match went.
    pub fn get_with_prefix_len<A: LookupAddress>(&self, addr: A) -> Result<(Option<Record>, u8)> {
        if self.buffer.is_closed() {
            return Err(Error::ClosedDatabase);
        }

        let key = addr.into_address_key()?;
        if key.is_ipv6() && self.metadata.ip_version == IpVersion::V4 {
            return Err(Error::InvalidArgument(format!(
                "'{}' is an IPv6 address, but this is an IPv4-only database",
                key.address()
            )));
        }

        let walker = TreeWalker::new(&self.buffer, &self.metadata, &self.ipv4_start);
        let (data_offset, prefix_len) = walker.lookup(&key, self.data_section_offset)?;

        let record = match data_offset {
            Some(offset) => {
                let decoder = Decoder::new(&self.buffer, self.data_section_offset);
                Some(decoder.decode(offset)?)
            }
            None => None,
        };

        Ok((record, prefix_len))
    }

    /// The database's decoded metadata. Constant time; parsed once at open.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// A fresh, single-pass, depth-first enumeration of every (network,
    /// record) pair the database encodes. Each call returns an independent
    /// cursor starting over from the root.
    pub fn iterate(&self) -> Result<impl Iterator<Item = Result<(Network, Record)>> + '_> {
        if self.buffer.is_closed() {
            return Err(Error::ClosedDatabase);
        }
        let walker = TreeWalker::new(&self.buffer, &self.metadata, &self.ipv4_start);
        Ok(walker.iter(self.data_section_offset))
    }

    /// Release the backing resource. Idempotent, and safe to call while
    /// other threads are mid-lookup: in-flight reads either complete on
    /// slices they already hold or observe the closed flag on their next
    /// `Buffer::slice` call and return `ClosedDatabase` cleanly.
    pub fn close(&self) {
        self.buffer.close();
    }

    /// Whether `close` has been called on this Reader.
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    /// Enter a scope that closes this Reader on exit (including early
    /// return or panic-unwind), the RAII equivalent of the reference
    /// library's `with open_database(...) as reader:` context manager.
    /// Fails eagerly if the Reader is already closed.
    pub fn scoped(self) -> Result<ReaderGuard> {
        if self.is_closed() {
            return Err(Error::ClosedDatabase);
        }
        Ok(ReaderGuard { reader: self })
    }
}

/// RAII guard returned by `Reader::scoped`. Derefs to `Reader`; closes it
/// when dropped.
pub struct ReaderGuard {
    reader: Reader,
}

impl std::ops::Deref for ReaderGuard {
    type Target = Reader;

    fn deref(&self) -> &Reader {
        &self.reader
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.reader.close();
    }
}
