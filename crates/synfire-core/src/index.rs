//! Index width selection for population and synapse ids
//!
//! Choosing the narrowest integer width that can address a given count is a
//! storage-compaction policy, not a correctness requirement: the store keeps
//! its backing arrays at fixed physical widths and records the chosen policy
//! width alongside, validated against actual maximum ids.

use core::fmt;

/// Integer width for addressing a population or synapse count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexWidth {
    /// 8-bit indices
    U8,
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
    /// 64-bit indices
    U64,
}

impl IndexWidth {
    /// Narrowest width that can address `count` items, widest on overflow
    pub fn for_count(count: usize) -> Self {
        if count <= u8::MAX as usize + 1 {
            Self::U8
        } else if count <= u16::MAX as usize + 1 {
            Self::U16
        } else if count <= u32::MAX as usize + 1 {
            Self::U32
        } else {
            Self::U64
        }
    }

    /// Largest index representable at this width
    pub fn max_index(&self) -> u64 {
        match self {
            Self::U8 => u8::MAX as u64,
            Self::U16 => u16::MAX as u64,
            Self::U32 => u32::MAX as u64,
            Self::U64 => u64::MAX,
        }
    }

    /// Whether an actual id fits at this width
    pub fn fits(&self, index: u64) -> bool {
        index <= self.max_index()
    }

    /// Width in bits
    pub fn bits(&self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
            Self::U64 => 64,
        }
    }
}

impl fmt::Display for IndexWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_selection() {
        assert_eq!(IndexWidth::for_count(0), IndexWidth::U8);
        assert_eq!(IndexWidth::for_count(256), IndexWidth::U8);
        assert_eq!(IndexWidth::for_count(257), IndexWidth::U16);
        assert_eq!(IndexWidth::for_count(65_536), IndexWidth::U16);
        assert_eq!(IndexWidth::for_count(65_537), IndexWidth::U32);
        assert_eq!(IndexWidth::for_count(1 << 33), IndexWidth::U64);
    }

    #[test]
    fn test_fits() {
        assert!(IndexWidth::U8.fits(255));
        assert!(!IndexWidth::U8.fits(256));
        assert!(IndexWidth::U16.fits(65_535));
        assert!(IndexWidth::U64.fits(u64::MAX));
    }

    #[test]
    fn test_display() {
        assert_eq!(IndexWidth::U16.to_string(), "u16");
    }
}
