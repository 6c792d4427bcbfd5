//! 4-byte shuffle: groups byte `j` of every 32-bit word together so that
//! slowly increasing integer tables compress better.

/// Transpose `src` into `dst` (resized to `src.len()`). Trailing bytes that
/// do not fill a whole word are copied unchanged.
pub(crate) fn shuffle4(src: &[u8], dst: &mut Vec<u8>) {
    dst.clear();
    dst.resize(src.len(), 0);
    let words = src.len() / 4;
    for (i, word) in src.chunks_exact(4).enumerate() {
        for (j, byte) in word.iter().enumerate() {
            dst[j * words + i] = *byte;
        }
    }
    dst[4 * words..].copy_from_slice(&src[4 * words..]);
}

/// Inverse of [`shuffle4`]; `dst` must have the same length as `src`.
pub(crate) fn unshuffle4(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    let words = src.len() / 4;
    for (i, word) in dst.chunks_exact_mut(4).enumerate() {
        for (j, byte) in word.iter_mut().enumerate() {
            *byte = src[j * words + i];
        }
    }
    dst[4 * words..].copy_from_slice(&src[4 * words..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_groups_bytes() {
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = Vec::new();
        shuffle4(&src, &mut dst);
        assert_eq!(dst, vec![1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn test_unshuffle_restores_with_tail() {
        let src: Vec<u8> = (0..23).collect();
        let mut shuffled = Vec::new();
        shuffle4(&src, &mut shuffled);
        assert_eq!(&shuffled[20..], &[20, 21, 22]);

        let mut restored = vec![0u8; src.len()];
        unshuffle4(&shuffled, &mut restored);
        assert_eq!(restored, src);
    }
}
