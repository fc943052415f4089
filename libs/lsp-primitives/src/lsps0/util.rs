//! LSPS0 discovery helpers.
//!
//! A node that accepts LSPS requests advertises feature bit 729 in its
//! node announcement.
use anyhow::Context;
use std::str::FromStr;

pub const LSP_SERVER_FEATURE_BIT: usize = 729;

/// A feature bitmap as announced in gossip, most significant byte first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureBitMap(Vec<u8>);

impl FromStr for FeatureBitMap {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).context("Failed to parse feature-bitmap")?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for FeatureBitMap {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FeatureBitMap {
    pub fn new(bitmap: Vec<u8>) -> Self {
        Self(bitmap)
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        is_feature_bit_enabled(&self.0, index)
    }

    /// True if the node announces itself as an LSP
    pub fn is_lsp(&self) -> bool {
        self.is_enabled(LSP_SERVER_FEATURE_BIT)
    }
}

/// Returns true if the feature-bit at `index` is set
pub fn is_feature_bit_enabled<T: AsRef<[u8]>>(bitmap: T, index: usize) -> bool {
    let bm = bitmap.as_ref();
    let (byte_index, bit_index) = (index / 8, index % 8);

    match bm.len().checked_sub(byte_index + 1) {
        Some(position) => bm[position] & (1u8 << bit_index) != 0,
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_bitmap() {
        for bit in 0..8 {
            let bitmap = FeatureBitMap::from_str(&format!("{:02x}", 1u8 << bit)).unwrap();
            for other in 0..16 {
                assert_eq!(bitmap.is_enabled(other), other == bit);
            }
        }

        let bitmap = FeatureBitMap::from_str("02").unwrap();
        assert!(!bitmap.is_enabled(1000));
        assert!(FeatureBitMap::from_str("xyz").is_err());
    }

    #[test]
    fn test_lsps_option_enabled_bitmap() {
        // Sets bit number 729
        let data = format!("02{}", "00".repeat(91));
        let bitmap = FeatureBitMap::from_str(&data).unwrap();

        assert!(bitmap.is_lsp());
        assert!(!bitmap.is_enabled(728));
        assert!(!bitmap.is_enabled(730));
    }
}
