/// The djb2 hash function used for all GVDB hash tables.
///
/// Key bytes are folded in as *signed* chars. This matches the on-disk
/// format: files produced on any platform hash non-ASCII keys identically.
pub fn djb_hash(key: &str) -> u32 {
    let mut hash_value: u32 = 5381;
    for byte in key.bytes() {
        hash_value = hash_value
            .wrapping_mul(33)
            .wrapping_add(byte as i8 as u32);
    }

    hash_value
}

/// Round `offset` up to the next multiple of `alignment`.
/// `alignment` must be a power of two.
pub fn align_offset(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod test {
    use super::{align_offset, djb_hash};

    #[test]
    fn align() {
        assert_eq!(align_offset(17, 16), 32);
        assert_eq!(align_offset(13, 8), 16);

        for offset in 1..=8 {
            assert_eq!(align_offset(offset, 8), 8);
        }

        for offset in 1..=4 {
            assert_eq!(align_offset(offset, 4), 4);
        }

        assert_eq!(align_offset(0, 2), 0);
        assert_eq!(align_offset(1, 2), 2);
        assert_eq!(align_offset(3, 2), 4);

        assert_eq!(align_offset(0, 1), 0);
        assert_eq!(align_offset(1, 1), 1);
    }

    #[test]
    fn hash() {
        assert_eq!(djb_hash(""), 5381);
        assert_eq!(djb_hash("a"), 5381u32.wrapping_mul(33) + 'a' as u32);
    }

    #[test]
    fn hash_sign_extension() {
        // 0xC3 0xA9 is 'é'. The bytes fold in sign-extended, so the result
        // differs from an unsigned fold.
        let signed = djb_hash("é");
        let mut unsigned: u32 = 5381;
        for byte in "é".bytes() {
            unsigned = unsigned.wrapping_mul(33).wrapping_add(byte as u32);
        }
        assert_ne!(signed, unsigned);

        let mut expected: u32 = 5381;
        for byte in "é".bytes() {
            expected = expected.wrapping_mul(33).wrapping_add((byte as i8) as u32);
        }
        assert_eq!(signed, expected);
    }
}
