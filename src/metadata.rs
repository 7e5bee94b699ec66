//! Locating and decoding the trailing MMDB metadata map.

use std::collections::HashMap;
use std::fmt;

use crate::buffer::Buffer;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::record::Record;

/// `\xAB\xCD\xEFMaxMind.com`, the sentinel marking the start of metadata.
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// The last 128 KiB of the file is searched for the sentinel; metadata maps
/// in practice are far smaller than this.
const SEARCH_WINDOW: usize = 128 * 1024;

/// IP address family a database was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4-only database.
    V4,
    /// IPv6 database (may also serve IPv4-mapped lookups).
    V6,
}

/// Bit width of one child record in a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 3 bytes per record, 6 bytes per node.
    Bits24,
    /// 3.5 bytes per record, 7 bytes per node.
    Bits28,
    /// 4 bytes per record, 8 bytes per node.
    Bits32,
}

impl RecordSize {
    fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            other => Err(Error::InvalidDatabase(format!(
                "unsupported record_size: {} bits",
                other
            ))),
        }
    }

    /// Bytes occupied by one full node (two records).
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }
}

impl fmt::Display for RecordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        };
        write!(f, "{}", bits)
    }
}

/// The decoded metadata map, plus the derived fields lookups need.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Number of nodes in the search tree.
    pub node_count: u64,
    /// Bit width of one tree record.
    pub record_size: RecordSize,
    /// IPv4 or IPv6.
    pub ip_version: IpVersion,
    /// Database type name, e.g. "GeoLite2-Country".
    pub database_type: String,
    /// Languages the `description` map is keyed by.
    pub languages: Vec<String>,
    /// MMDB binary format major version.
    pub binary_format_major_version: u64,
    /// MMDB binary format minor version.
    pub binary_format_minor_version: u64,
    /// Unix timestamp the database was built.
    pub build_epoch: u64,
    /// Language -> human-readable description.
    pub description: HashMap<String, String>,
    /// Bytes occupied by one tree node (`record_size / 4`).
    pub node_byte_size: usize,
    /// Total size of the search tree in bytes (`node_count * node_byte_size`).
    pub search_tree_size: usize,

    raw: Record,
}

impl Metadata {
    /// Locate the sentinel and decode the metadata map that follows it.
    ///
    /// Returns the parsed `Metadata` plus the absolute offset of the data
    /// section (the pointer origin `Decoder`s over this buffer must use).
    pub(crate) fn parse(buffer: &Buffer) -> Result<(Self, usize)> {
        let marker_offset = find_metadata_marker(buffer)?;
        let metadata_offset = marker_offset + METADATA_MARKER.len();

        // Pointers inside the metadata map (there typically are none) must
        // never resolve to bytes before the map itself.
        let decoder = Decoder::new(buffer, metadata_offset);
        let raw = decoder.decode(0)?;

        let map = raw
            .as_map()
            .ok_or_else(|| Error::InvalidDatabase("metadata is not a map".to_string()))?;

        let node_count = require_uint(map, "node_count")?;
        let record_size = RecordSize::from_bits(require_uint(map, "record_size")?)?;
        let ip_version = match require_uint(map, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => {
                return Err(Error::InvalidDatabase(format!(
                    "invalid ip_version: {}",
                    other
                )))
            }
        };
        let database_type = require_string(map, "database_type")?;
        let languages = require_string_array(map, "languages").unwrap_or_default();
        let binary_format_major_version = require_uint(map, "binary_format_major_version")?;
        let binary_format_minor_version = require_uint(map, "binary_format_minor_version")?;
        let build_epoch = require_uint(map, "build_epoch")?;
        let description = require_string_map(map, "description").unwrap_or_default();

        let node_byte_size = record_size.node_bytes();
        let search_tree_size = node_count as usize * node_byte_size;

        // search_tree_size + 16 bytes of zero separator is where the data
        // section, and thus the Decoder origin all lookups use, begins.
        let data_section_offset = search_tree_size + 16;

        Ok((
            Metadata {
                node_count,
                record_size,
                ip_version,
                database_type,
                languages,
                binary_format_major_version,
                binary_format_minor_version,
                build_epoch,
                description,
                node_byte_size,
                search_tree_size,
                raw,
            },
            data_section_offset,
        ))
    }

    /// The full decoded metadata map, including keys this struct does not
    /// otherwise promote to a typed field (forward-compatible with databases
    /// that add new metadata keys).
    pub fn as_record(&self) -> &Record {
        &self.raw
    }
}

/// Reverse-search the last 128 KiB of `buffer` for the MMDB sentinel,
/// returning the absolute offset of its last occurrence.
pub(crate) fn find_metadata_marker(buffer: &Buffer) -> Result<usize> {
    if buffer.len() < METADATA_MARKER.len() {
        return Err(Error::InvalidDatabase(
            "file too small to contain an MMDB metadata marker".to_string(),
        ));
    }

    let search_start = buffer.len().saturating_sub(SEARCH_WINDOW);
    let window = buffer.slice(search_start, buffer.len() - search_start)?;

    let mut last_marker = None;
    let mut start = 0;
    while let Some(pos) = find_subslice(&window[start..], METADATA_MARKER) {
        last_marker = Some(search_start + start + pos);
        start += pos + 1;
        if start >= window.len() {
            break;
        }
    }

    last_marker.ok_or_else(|| Error::InvalidDatabase("MMDB metadata marker not found".to_string()))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn require_uint(map: &HashMap<String, Record>, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| Error::InvalidDatabase(format!("'{}' is not an unsigned integer", key))),
        None => Err(Error::InvalidDatabase(format!(
            "required metadata field '{}' is missing",
            key
        ))),
    }
}

fn require_string(map: &HashMap<String, Record>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(Record::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::InvalidDatabase(format!("'{}' is not a string", key))),
        None => Err(Error::InvalidDatabase(format!(
            "required metadata field '{}' is missing",
            key
        ))),
    }
}

fn require_string_array(map: &HashMap<String, Record>, key: &str) -> Option<Vec<String>> {
    match map.get(key) {
        Some(Record::Array(items)) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn require_string_map(map: &HashMap<String, Record>, key: &str) -> Option<HashMap<String, String>> {
    match map.get(key) {
        Some(Record::Map(m)) => Some(
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
        ),
        _ => None,
    }
}
