//! Hand-built MMDB byte assembly shared by the integration tests.
//!
//! No `.mmdb` fixtures ship in this workspace, so each test reconstructs a
//! minimal synthetic database byte-for-byte: a binary search tree built from
//! a tiny trie, a data section of self-describing values, and a metadata
//! map, all encoded with the same control-byte format `src/decoder.rs`
//! reads. This mirrors the hand-built-byte-array style already used for the
//! decoder's own unit tests, just assembled into whole files instead of
//! isolated control bytes.

#![allow(dead_code)]

/// MMDB value type tags (see `src/decoder.rs`).
mod tag {
    pub const STRING: u8 = 2;
    pub const MAP: u8 = 7;
    pub const UINT16: u8 = 5;
    pub const UINT32: u8 = 6;
    pub const UINT64: u8 = 9;
    pub const UINT128: u8 = 10;
    pub const ARRAY: u8 = 11;
}

/// Control byte(s) for a value of `type_id` carrying `size` bytes/elements.
fn header(type_id: u8, size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let (top3, ext_byte) = if type_id <= 7 {
        (type_id, None)
    } else {
        (0u8, Some(type_id - 7))
    };

    if size < 29 {
        out.push((top3 << 5) | size as u8);
        if let Some(b) = ext_byte {
            out.push(b);
        }
    } else if size < 29 + 256 {
        out.push((top3 << 5) | 29);
        if let Some(b) = ext_byte {
            out.push(b);
        }
        out.push((size - 29) as u8);
    } else if size < 29 + 256 + 65536 {
        out.push((top3 << 5) | 30);
        if let Some(b) = ext_byte {
            out.push(b);
        }
        out.extend_from_slice(&((size - 29 - 256) as u16).to_be_bytes());
    } else {
        out.push((top3 << 5) | 31);
        if let Some(b) = ext_byte {
            out.push(b);
        }
        let extra = (size - 29 - 256 - 65536) as u32;
        out.extend_from_slice(&extra.to_be_bytes()[1..]);
    }
    out
}

pub fn encode_string(s: &str) -> Vec<u8> {
    let mut out = header(tag::STRING, s.len());
    out.extend_from_slice(s.as_bytes());
    out
}

pub fn encode_uint16(v: u16) -> Vec<u8> {
    let mut out = header(tag::UINT16, 2);
    out.extend_from_slice(&v.to_be_bytes());
    out
}

pub fn encode_uint32(v: u32) -> Vec<u8> {
    let mut out = header(tag::UINT32, 4);
    out.extend_from_slice(&v.to_be_bytes());
    out
}

pub fn encode_uint64(v: u64) -> Vec<u8> {
    let mut out = header(tag::UINT64, 8);
    out.extend_from_slice(&v.to_be_bytes());
    out
}

pub fn encode_uint128(v: u128) -> Vec<u8> {
    let mut out = header(tag::UINT128, 16);
    out.extend_from_slice(&v.to_be_bytes());
    out
}

pub fn encode_array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header(tag::ARRAY, items.len());
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

pub fn encode_map(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = header(tag::MAP, entries.len());
    for (key, value) in entries {
        out.extend_from_slice(&encode_string(key));
        out.extend_from_slice(value);
    }
    out
}

/// A map `{"ip": addr}`, the payload shape the canonical MaxMind test
/// fixtures (`test-ipv4-24`, `test-ipv6-24`, `test-mixed-24`) use for every
/// leaf.
pub fn ip_record(addr: &str) -> Vec<u8> {
    encode_map(&[("ip", encode_string(addr))])
}

/// Appends self-describing values to a data section, handing back each
/// value's offset from the start of the data section for use as a tree
/// leaf's data pointer.
#[derive(Default)]
pub struct DataSection {
    bytes: Vec<u8>,
}

impl DataSection {
    pub fn new() -> Self {
        DataSection::default()
    }

    pub fn push(&mut self, encoded: Vec<u8>) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&encoded);
        offset
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A node slot before node indices are finalized.
#[derive(Clone, Copy)]
enum Child {
    Unassigned,
    Node(usize),
    Data(u32),
}

/// Builds a binary search tree from a set of (prefix, prefix_len, data
/// offset) insertions, bit-by-bit from the MSB, sharing internal nodes the
/// way a real MMDB encoder would.
pub struct TreeBuilder {
    nodes: Vec<[Child; 2]>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            nodes: vec![[Child::Unassigned, Child::Unassigned]],
        }
    }

    /// Insert a network whose `prefix_len` MSB-first bits of `prefix`
    /// (a 128-bit value; left-pad an IPv4 address with 96 zero bits to
    /// embed it under a shared IPv6 root) resolve to `data_offset`.
    pub fn insert(&mut self, prefix: u128, prefix_len: u8, data_offset: u32) {
        let mut node = 0usize;
        for i in 0..prefix_len {
            let bit = ((prefix >> (127 - i as u32)) & 1) as usize;
            let last = i + 1 == prefix_len;
            if last {
                self.nodes[node][bit] = Child::Data(data_offset);
            } else {
                match self.nodes[node][bit] {
                    Child::Node(n) => node = n,
                    _ => {
                        let new_index = self.nodes.len();
                        self.nodes.push([Child::Unassigned, Child::Unassigned]);
                        self.nodes[node][bit] = Child::Node(new_index);
                        node = new_index;
                    }
                }
            }
        }
    }

    /// Serialize as a 24-bit-record tree (3 bytes per child, 6 per node),
    /// matching the canonical MaxMind `*-24` test fixtures this pack's
    /// scenarios are named after.
    pub fn build_24(&self) -> Vec<u8> {
        let node_count = self.nodes.len() as u32;
        let mut out = Vec::with_capacity(self.nodes.len() * 6);
        for pair in &self.nodes {
            for child in pair {
                let value = match child {
                    Child::Unassigned => node_count,
                    Child::Node(n) => *n as u32,
                    Child::Data(offset) => node_count + 16 + offset,
                };
                out.push((value >> 16) as u8);
                out.push((value >> 8) as u8);
                out.push(value as u8);
            }
        }
        out
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }
}

pub fn build_metadata(node_count: u32, record_size: u16, ip_version: u16, database_type: &str) -> Vec<u8> {
    encode_map(&[
        ("node_count", encode_uint32(node_count)),
        ("record_size", encode_uint16(record_size)),
        ("ip_version", encode_uint16(ip_version)),
        ("database_type", encode_string(database_type)),
        ("languages", encode_array(&[encode_string("en")])),
        ("binary_format_major_version", encode_uint16(2)),
        ("binary_format_minor_version", encode_uint16(0)),
        ("build_epoch", encode_uint64(0)),
        (
            "description",
            encode_map(&[("en", encode_string(database_type))]),
        ),
    ])
}

/// `[tree | 16 zero bytes | data section | sentinel | metadata map]`.
pub fn assemble(tree: &[u8], data: &[u8], metadata: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tree.len() + 16 + data.len() + 15 + metadata.len());
    out.extend_from_slice(tree);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(data);
    out.extend_from_slice(b"\xAB\xCD\xEFMaxMind.com");
    out.extend_from_slice(metadata);
    out
}

/// IPv4 address bits, unshifted (occupying the low 32 bits of a 128-bit
/// word) — the representation to insert at tree depth 96+ when the address
/// is embedded under a shared IPv6 root.
pub fn ipv4_bits(a: u8, b: u8, c: u8, d: u8) -> u128 {
    u32::from_be_bytes([a, b, c, d]) as u128
}

/// IPv4 address bits left-justified in a 128-bit word — the representation
/// a pure IPv4-only tree (32-bit address space, bit 0 at the top) expects.
pub fn ipv4_embed(a: u8, b: u8, c: u8, d: u8) -> u128 {
    ipv4_bits(a, b, c, d) << 96
}

pub fn ipv6_bits(addr: std::net::Ipv6Addr) -> u128 {
    u128::from_be_bytes(addr.octets())
}
