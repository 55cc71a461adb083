//! Bit-Packed Canonical K-mers
//! ===========================
//!
//! - 2 bits per nucleotide packed into a `u128` (k up to 63)
//! - Canonical code = numerically smaller of the forward and reverse-complement codes
//! - Neighbor generation by shifting one nucleotide in at either end
//! - Rolling extraction of canonical codes from reads

use crate::core::data_structures::{
    code_nucleotide, nucleotide_code, Direction, Position, Sequence,
};
use anyhow::{anyhow, Result};

/// Canonical 2-bit code of a k-mer
pub type KmerCode = u128;

/// Largest k-mer size representable in a `KmerCode`
pub const MAX_KMER_SIZE: usize = 63;

fn mask(k: usize) -> u128 {
    (1u128 << (2 * k)) - 1
}

/// Reverse-complement of a forward code of length `k`
pub fn reverse_code(code: u128, k: usize) -> u128 {
    let mut forward = code;
    let mut reverse = 0u128;
    for _ in 0..k {
        reverse = (reverse << 2) | (3 - (forward & 0b11));
        forward >>= 2;
    }
    reverse
}

/// Immutable k-mer: its canonical code and the matching reverse code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kmer {
    first: u128,
    second: u128,
    k: usize,
}

impl Kmer {
    /// Build from any code of length `k`; the smaller strand becomes canonical
    pub fn from_code(code: u128, k: usize) -> Self {
        let code = code & mask(k);
        let rc = reverse_code(code, k);
        if rc < code {
            Self {
                first: rc,
                second: code,
                k,
            }
        } else {
            Self {
                first: code,
                second: rc,
                k,
            }
        }
    }

    pub fn from_word(word: &str) -> Result<Self> {
        let k = word.len();
        if k == 0 || k > MAX_KMER_SIZE {
            return Err(anyhow!("Invalid k-mer length: {}", k));
        }
        let mut code = 0u128;
        for base in word.bytes() {
            let bits = nucleotide_code(base)
                .ok_or_else(|| anyhow!("Invalid nucleotide: {}", base as char))?;
            code = (code << 2) | bits as u128;
        }
        Ok(Self::from_code(code, k))
    }

    pub fn code(&self) -> KmerCode {
        self.first
    }

    pub fn reverse(&self) -> u128 {
        self.second
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Canonical word
    pub fn word(&self) -> String {
        let mut word = vec![b'A'; self.k];
        let mut code = self.first;
        for i in (0..self.k).rev() {
            word[i] = code_nucleotide((code & 0b11) as u8);
            code >>= 2;
        }
        String::from_utf8_lossy(&word).into_owned()
    }

    pub fn sequence(&self) -> Sequence {
        Sequence::new(&self.word())
    }

    /// Canonical k-mer obtained by adding `nucleotide` at `position` of the canonical word
    pub fn neighbor(&self, nucleotide: u8, position: Position) -> Kmer {
        let n = (nucleotide & 0b11) as u128;
        let code = match position {
            Position::After => (self.first << 2) | n,
            Position::Before => (n << (2 * (self.k - 1))) | (self.first >> 2),
        };
        Kmer::from_code(code, self.k)
    }

    /// Strand under which `other` follows this k-mer at `position`
    pub fn compare(&self, other: &Kmer, position: Position) -> Option<Direction> {
        self.sequence().compare_next(&other.sequence(), position)
    }
}

/// Canonical codes of every k-mer in `read`, restarting after ambiguous bases
pub fn canonical_kmers(read: &[u8], k: usize) -> Vec<KmerCode> {
    let mut codes = Vec::with_capacity(read.len().saturating_sub(k) + 1);
    if k == 0 || k > MAX_KMER_SIZE || read.len() < k {
        return codes;
    }
    let m = mask(k);
    let shift = 2 * (k - 1);
    let mut forward = 0u128;
    let mut reverse = 0u128;
    let mut valid = 0usize;
    for &base in read {
        match nucleotide_code(base) {
            Some(bits) => {
                let bits = bits as u128;
                forward = ((forward << 2) | bits) & m;
                reverse = (reverse >> 2) | ((3 - bits) << shift);
                valid += 1;
                if valid >= k {
                    codes.push(forward.min(reverse));
                }
            }
            None => {
                valid = 0;
                forward = 0;
                reverse = 0;
            }
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data_structures::reverse_complement;

    #[test]
    fn test_canonical_code_matches_reverse_complement() {
        let kmer = Kmer::from_word("ACGTTGCA").unwrap();
        let rc = Kmer::from_word(&reverse_complement("ACGTTGCA")).unwrap();
        assert_eq!(kmer.code(), rc.code());
        assert_eq!(kmer.word(), "ACGTTGCA".min("TGCAACGT"));
    }

    #[test]
    fn test_word_round_trip() {
        let kmer = Kmer::from_word("GATTACA").unwrap();
        assert_eq!(kmer.word(), "GATTACA");
        assert_eq!(kmer.sequence().first_word(), "GATTACA");
        assert!(Kmer::from_word("GATNACA").is_err());
    }

    #[test]
    fn test_neighbors_overlap() {
        let kmer = Kmer::from_word("AACGT").unwrap();
        let after = kmer.neighbor(1, Position::After);
        assert_eq!(after.word(), "ACGTC");
        assert_eq!(kmer.compare(&after, Position::After), Some(Direction::Direct));

        let before = kmer.neighbor(3, Position::Before);
        assert_eq!(before.word(), Kmer::from_word("TAACG").unwrap().word());
        assert!(kmer.compare(&before, Position::Before).is_some());
    }

    #[test]
    fn test_canonical_kmers_skips_ambiguous() {
        let codes = canonical_kmers(b"ACGTNACGTA", 4);
        // ACGT, then ACGT and CGTA after the N
        assert_eq!(codes.len(), 3);
        assert_eq!(codes[0], codes[1]);
        let expected = Kmer::from_word("CGTA").unwrap().code();
        assert_eq!(codes[2], expected);
    }

    #[test]
    fn test_large_k() {
        let word: String = "ACGTTGCAAC".repeat(7)[..63].to_string();
        let kmer = Kmer::from_word(&word).unwrap();
        let rc = Kmer::from_word(&reverse_complement(&word)).unwrap();
        assert_eq!(kmer.code(), rc.code());
        assert_eq!(canonical_kmers(word.as_bytes(), 63), vec![kmer.code()]);
    }
}
