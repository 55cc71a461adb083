//! Property-based tests for the core value types
//! Canonical k-mer codes, double-stranded sequences and exact rationals

use proptest::prelude::*;
use te_forge::core::data_structures::Sequence;
use te_forge::core::kmer::{canonical_kmers, Kmer};
use te_forge::core::{reverse_complement, Rational};

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

proptest! {
    #[test]
    fn property_canonical_code_is_strand_independent(s in "[ACGT]{1,63}") {
        let forward = Kmer::from_word(&s).unwrap();
        let backward = Kmer::from_word(&reverse_complement(&s)).unwrap();
        prop_assert_eq!(forward.code(), backward.code());
        prop_assert!(forward.code() <= forward.reverse());
    }

    #[test]
    fn property_canonical_word_round_trips(s in "[ACGT]{1,63}") {
        let kmer = Kmer::from_word(&s).unwrap();
        let word = kmer.word();
        prop_assert!(word == s || word == reverse_complement(&s));
        prop_assert_eq!(Kmer::from_code(kmer.code(), s.len()), kmer);
    }

    #[test]
    fn property_rolling_codes_match_windows(read in "[ACGT]{20,120}", k in 3usize..31) {
        let codes = canonical_kmers(read.as_bytes(), k);
        prop_assert_eq!(codes.len(), read.len() - k + 1);
        for (i, code) in codes.iter().enumerate() {
            prop_assert_eq!(*code, Kmer::from_word(&read[i..i + k]).unwrap().code());
        }
    }

    #[test]
    fn property_sequence_is_strand_independent(s in "[ACGT]{1,200}") {
        let sequence = Sequence::new(&s);
        prop_assert_eq!(&sequence, &Sequence::new(&reverse_complement(&s)));
        prop_assert!(sequence.first_word() <= sequence.second_word());
        prop_assert_eq!(sequence.second_word(), reverse_complement(sequence.first_word()));
    }

    #[test]
    fn property_rational_is_normalized(num in -10_000i64..10_000, den in 1i64..10_000, m in 1i64..1000) {
        let r = Rational::new(num * m, den * m);
        prop_assert_eq!(r, Rational::new(num, den));
        prop_assert!(r.denom() > 0);
        if num != 0 {
            prop_assert_eq!(gcd(r.numer(), r.denom()), 1);
        } else {
            prop_assert!(r.is_zero());
        }
        prop_assert_eq!(Rational::new(-num, -den), r);
    }

    #[test]
    fn property_rational_arithmetic_is_exact(a in -1000i64..1000, b in 1i64..1000, c in -1000i64..1000, d in 1i64..1000) {
        let x = Rational::new(a, b);
        let y = Rational::new(c, d);
        prop_assert_eq!(x + y, Rational::new(a * d + c * b, b * d));
        prop_assert_eq!((x + y) - y, x);
        prop_assert_eq!(x * y, Rational::new(a * c, b * d));
        if c != 0 {
            prop_assert_eq!((x / y) * y, x);
        }
    }
}

#[cfg(test)]
mod sentinel_properties {
    use super::*;

    #[test]
    fn property_division_by_zero_gives_sentinels() {
        for _ in 0..100 {
            let n = fastrand::i64(1..1000);
            assert!(Rational::new(n, 0).is_infinite());
            assert_eq!(Rational::new(n, 0), Rational::INFINITY);
            assert_eq!(Rational::new(-n, 0), Rational::NEG_INFINITY);
        }
        assert!(Rational::new(0, 0).is_nan());
    }

    #[test]
    fn property_ambiguous_bases_split_windows() {
        for _ in 0..50 {
            let left: String = (0..fastrand::usize(5..30))
                .map(|_| b"ACGT"[fastrand::usize(0..4)] as char)
                .collect();
            let right: String = (0..fastrand::usize(5..30))
                .map(|_| b"ACGT"[fastrand::usize(0..4)] as char)
                .collect();
            let read = format!("{left}N{right}");
            let k = 5;
            let expected = (left.len() - k + 1) + (right.len() - k + 1);
            assert_eq!(canonical_kmers(read.as_bytes(), k).len(), expected);
        }
    }
}
