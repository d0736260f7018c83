//! Canonical byte encoding used as the preimage of every digest.
//!
//! Integers are fixed-width little-endian, byte strings and sequences carry a
//! u64 length prefix, and struct fields are written in declaration order.
//! Changing any of this changes every hash on the chain.

pub trait CanonicalEncode {
    fn encode_canonical(&self, out: &mut Vec<u8>);

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_canonical(&mut out);
        out
    }
}

pub(crate) fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_bytes(out: &mut Vec<u8>, b: &[u8]) {
    write_u64(out, b.len() as u64);
    out.extend_from_slice(b);
}

pub(crate) fn write_seq<T: CanonicalEncode>(out: &mut Vec<u8>, items: &[T]) {
    write_u64(out, items.len() as u64);
    for item in items {
        item.encode_canonical(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(u32, Vec<u8>);

    impl CanonicalEncode for Pair {
        fn encode_canonical(&self, out: &mut Vec<u8>) {
            write_u32(out, self.0);
            write_bytes(out, &self.1);
        }
    }

    #[test]
    fn test_golden_layout() {
        let bytes = Pair(1, vec![0xaa, 0xbb]).canonical_bytes();
        assert_eq!(
            bytes,
            vec![1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0xaa, 0xbb]
        );
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        // Without length prefixes these two would encode identically.
        let mut a = Vec::new();
        write_bytes(&mut a, b"ab");
        write_bytes(&mut a, b"c");
        let mut b = Vec::new();
        write_bytes(&mut b, b"a");
        write_bytes(&mut b, b"bc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequence_prefix() {
        let mut out = Vec::new();
        write_seq(&mut out, &[Pair(7, vec![]), Pair(8, vec![])]);
        assert_eq!(&out[..8], &2u64.to_le_bytes());
        assert_eq!(out.len(), 8 + 2 * (4 + 8));
    }
}
