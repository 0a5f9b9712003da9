//! Region identity

use crate::table_name::TableName;
use sha2::{Digest, Sha256};
use std::fmt;

/// Contiguous key range of a table served as one unit
///
/// Regions are locked by their encoded name, a fixed-width digest of the
/// full region name.
///
/// The digest is SHA-256 truncated to 16 bytes, rendered as 32 lowercase hex
/// characters. HBase derives the same-width name from MD5, so encoded names
/// here do not match the ones a live cluster reports for the same region.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RegionInfo {
    table: TableName,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    region_id: u64,
    encoded_name: String,
}

impl RegionInfo {
    /// Length of an encoded region name in hex characters
    pub const ENCODED_NAME_LEN: usize = 32;

    /// Region covering the whole key space of `table`
    pub fn new(table: TableName) -> Self {
        Self::with_keys(table, Vec::new(), Vec::new(), 0)
    }

    /// Region covering `[start_key, end_key)`; an empty end key means unbounded
    pub fn with_keys(
        table: TableName,
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
        region_id: u64,
    ) -> Self {
        let start_key = start_key.into();
        let encoded_name = encode_region_name(&region_name_bytes(&table, &start_key, region_id));
        Self {
            table,
            start_key,
            end_key: end_key.into(),
            region_id,
            encoded_name,
        }
    }

    /// Owning table
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Inclusive start key
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    /// Exclusive end key (empty when unbounded)
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    /// Region id (creation timestamp in a live cluster)
    pub fn region_id(&self) -> u64 {
        self.region_id
    }

    /// Full region name: `<table>,<start_key>,<region_id>.`
    pub fn region_name(&self) -> Vec<u8> {
        region_name_bytes(&self.table, &self.start_key, self.region_id)
    }

    /// Lowercase hex digest identifying this region in locks and reports
    ///
    /// First 16 bytes of the SHA-256 of [`region_name`](Self::region_name).
    pub fn encoded_name(&self) -> &str {
        &self.encoded_name
    }

    /// Whether `row` falls in this region's key range
    pub fn contains_row(&self, row: &[u8]) -> bool {
        row >= self.start_key.as_slice()
            && (self.end_key.is_empty() || row < self.end_key.as_slice())
    }
}

fn region_name_bytes(table: &TableName, start_key: &[u8], region_id: u64) -> Vec<u8> {
    let mut name = table.to_string().into_bytes();
    name.push(b',');
    name.extend_from_slice(start_key);
    name.push(b',');
    name.extend_from_slice(region_id.to_string().as_bytes());
    name.push(b'.');
    name
}

fn encode_region_name(region_name: &[u8]) -> String {
    let digest = Sha256::digest(region_name);
    hex::encode(&digest[..RegionInfo::ENCODED_NAME_LEN / 2])
}

impl fmt::Debug for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionInfo({}, {})", self.table, self.encoded_name)
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.region_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableName {
        TableName::parse(name).unwrap()
    }

    #[test]
    fn test_region_name() {
        let region = RegionInfo::with_keys(table("ns3:table3"), b"row".to_vec(), Vec::new(), 42);
        assert_eq!(region.to_string(), "ns3:table3,row,42.");
    }

    #[test]
    fn test_encoded_name_is_stable_hex() {
        let a = RegionInfo::new(table("ns3:table3"));
        let b = RegionInfo::new(table("ns3:table3"));

        assert_eq!(a.encoded_name(), b.encoded_name());
        assert_eq!(a.encoded_name().len(), RegionInfo::ENCODED_NAME_LEN);
        assert!(a
            .encoded_name()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_encoded_name_is_truncated_sha256() {
        let region = RegionInfo::new(table("ns3:table3"));
        assert_eq!(region.region_name(), b"ns3:table3,,0.".to_vec());
        assert_eq!(region.encoded_name(), "44cfaf19986438067afa45f81a287bad");

        let digest = Sha256::digest(region.region_name());
        assert_eq!(region.encoded_name(), hex::encode(&digest[..16]));
    }

    #[test]
    fn test_encoded_name_differs_per_region() {
        let a = RegionInfo::with_keys(table("t"), Vec::new(), b"m".to_vec(), 1);
        let b = RegionInfo::with_keys(table("t"), b"m".to_vec(), Vec::new(), 1);
        assert_ne!(a.encoded_name(), b.encoded_name());
    }

    #[test]
    fn test_contains_row() {
        let region = RegionInfo::with_keys(table("t"), b"b".to_vec(), b"d".to_vec(), 1);
        assert!(!region.contains_row(b"a"));
        assert!(region.contains_row(b"b"));
        assert!(region.contains_row(b"c"));
        assert!(!region.contains_row(b"d"));

        let whole = RegionInfo::new(table("t"));
        assert!(whole.contains_row(b""));
        assert!(whole.contains_row(b"zzz"));
    }
}
