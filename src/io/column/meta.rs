//! Per-block string metadata: a table of cumulative end offsets followed by
//! an NA bitmap of `1 + n / 32` words. Bit `k % 32` of word `k / 32` marks
//! element `k` as missing, and bit `n % 32` of the last word is set when the
//! block holds at least one NA.

use crate::core::BlockcolError;
use crate::io::column::StringEncoding;

pub(crate) const NA_BLOCK: usize = 32;

/// Number of NA bitmap words for a block of `nr_of_elements`.
pub(crate) fn na_words(nr_of_elements: usize) -> usize {
    1 + nr_of_elements / NA_BLOCK
}

fn encoded_len(value: &str, encoding: StringEncoding) -> Result<u32, BlockcolError> {
    let len = match encoding {
        StringEncoding::Native | StringEncoding::Utf8 => value.len(),
        StringEncoding::Latin1 => {
            let mut chars = 0usize;
            for c in value.chars() {
                if c as u32 > 0xFF {
                    return Err(BlockcolError::InvalidInput(format!(
                        "character {c:?} cannot be stored as latin1"
                    )));
                }
                chars += 1;
            }
            chars
        }
    };
    u32::try_from(len).map_err(|_| {
        BlockcolError::CorruptBlock(format!("string of {len} bytes does not fit a block"))
    })
}

/// Fill `meta` (of length `n + na_words(n)`) with the cumulative offsets and
/// the NA bitmap of `block`. Returns the number of character bytes.
pub(crate) fn calculate_sizes<S: AsRef<str>>(
    block: &[Option<S>],
    encoding: StringEncoding,
    meta: &mut [u32],
) -> Result<u32, BlockcolError> {
    let n = block.len();
    debug_assert_eq!(meta.len(), n + na_words(n));
    let (cumulative, na) = meta.split_at_mut(n);
    na.fill(0);

    let mut total: u32 = 0;
    let mut has_na = false;
    for (k, (value, slot)) in block.iter().zip(cumulative.iter_mut()).enumerate() {
        match value {
            Some(value) => {
                total = total
                    .checked_add(encoded_len(value.as_ref(), encoding)?)
                    .ok_or_else(|| {
                        BlockcolError::CorruptBlock(
                            "block character data exceeds 4 GiB".into(),
                        )
                    })?;
            }
            None => {
                na[k / NA_BLOCK] |= 1 << (k % NA_BLOCK);
                has_na = true;
            }
        }
        *slot = total;
    }
    if has_na {
        na[n / NA_BLOCK] |= 1 << (n % NA_BLOCK);
    }
    Ok(total)
}

/// Copy the characters of `block` into `chars` at the offsets in `cumulative`.
pub(crate) fn serialize_block<S: AsRef<str>>(
    block: &[Option<S>],
    encoding: StringEncoding,
    cumulative: &[u32],
    chars: &mut [u8],
) {
    let mut pos = 0usize;
    for (value, end) in block.iter().zip(cumulative) {
        let end = *end as usize;
        if let Some(value) = value {
            let target = &mut chars[pos..end];
            match encoding {
                StringEncoding::Native | StringEncoding::Utf8 => {
                    target.copy_from_slice(value.as_ref().as_bytes())
                }
                StringEncoding::Latin1 => {
                    for (byte, c) in target.iter_mut().zip(value.as_ref().chars()) {
                        *byte = c as u32 as u8;
                    }
                }
            }
        }
        pos = end;
    }
}

/// Reject a cumulative size table that decreases anywhere.
pub(crate) fn validate_sizes(cumulative: &[u32]) -> Result<(), BlockcolError> {
    match cumulative.windows(2).position(|w| w[1] < w[0]) {
        Some(k) => Err(BlockcolError::FormatError(format!(
            "size table decreases after element {k}: {} then {}",
            cumulative[k],
            cumulative[k + 1]
        ))),
        None => Ok(()),
    }
}

fn decode_string(bytes: &[u8], encoding: StringEncoding) -> Result<String, BlockcolError> {
    match encoding {
        StringEncoding::Native | StringEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| BlockcolError::FormatError(format!("invalid utf-8 string: {e}"))),
        StringEncoding::Latin1 => Ok(bytes.iter().map(|b| *b as char).collect()),
    }
}

/// Decoder over one block: its metadata and its character bytes.
pub(crate) struct BlockDecoder<'a> {
    cumulative: &'a [u32],
    na: &'a [u32],
    chars: &'a [u8],
    encoding: StringEncoding,
}

impl<'a> BlockDecoder<'a> {
    pub fn new(
        meta: &'a [u32],
        nr_of_elements: usize,
        chars: &'a [u8],
        encoding: StringEncoding,
    ) -> Result<Self, BlockcolError> {
        if nr_of_elements == 0 || meta.len() != nr_of_elements + na_words(nr_of_elements) {
            return Err(BlockcolError::FormatError(format!(
                "block metadata of {} words does not match {nr_of_elements} elements",
                meta.len()
            )));
        }
        let (cumulative, na) = meta.split_at(nr_of_elements);
        validate_sizes(cumulative)?;
        Ok(Self {
            cumulative,
            na,
            chars,
            encoding,
        })
    }

    /// Total character bytes the size table declares.
    pub fn char_len(&self) -> usize {
        self.cumulative.last().map_or(0, |end| *end as usize)
    }

    fn has_na(&self) -> bool {
        let n = self.cumulative.len();
        self.na[n / NA_BLOCK] & (1 << (n % NA_BLOCK)) != 0
    }

    fn element_start(&self, k: usize) -> u32 {
        if k == 0 { 0 } else { self.cumulative[k - 1] }
    }

    fn take(&self, pos: &mut u32, end: u32) -> Result<&'a [u8], BlockcolError> {
        if end < *pos || end as usize > self.chars.len() {
            return Err(BlockcolError::FormatError(format!(
                "string offsets {}..{end} outside of {} block bytes",
                *pos,
                self.chars.len()
            )));
        }
        let chars: &'a [u8] = self.chars;
        let bytes = &chars[*pos as usize..end as usize];
        *pos = end;
        Ok(bytes)
    }

    /// Append elements `first..=last` to `out`.
    pub fn decode_into(
        &self,
        first: usize,
        last: usize,
        out: &mut Vec<Option<String>>,
    ) -> Result<(), BlockcolError> {
        let mut pos = self.element_start(first);
        if !self.has_na() {
            for k in first..=last {
                let bytes = self.take(&mut pos, self.cumulative[k])?;
                out.push(Some(decode_string(bytes, self.encoding)?));
            }
            return Ok(());
        }

        let mut k = first;
        while k <= last {
            let cycle = k / NA_BLOCK;
            let cycle_last = last.min(cycle * NA_BLOCK + NA_BLOCK - 1);
            let word = self.na[cycle];
            for element in k..=cycle_last {
                let bytes = self.take(&mut pos, self.cumulative[element])?;
                if word != 0 && word & (1 << (element % NA_BLOCK)) != 0 {
                    out.push(None);
                } else {
                    out.push(Some(decode_string(bytes, self.encoding)?));
                }
            }
            k = cycle_last + 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(block: &[Option<&str>], encoding: StringEncoding) -> (Vec<u32>, Vec<u8>) {
        let mut meta = vec![0u32; block.len() + na_words(block.len())];
        let total = calculate_sizes(block, encoding, &mut meta).unwrap();
        let mut chars = vec![0u8; total as usize];
        serialize_block(block, encoding, &meta[..block.len()], &mut chars);
        (meta, chars)
    }

    fn decode(meta: &[u32], n: usize, chars: &[u8], first: usize, last: usize) -> Vec<Option<String>> {
        let decoder = BlockDecoder::new(meta, n, chars, StringEncoding::Utf8).unwrap();
        let mut out = Vec::new();
        decoder.decode_into(first, last, &mut out).unwrap();
        out
    }

    #[test]
    fn test_sizes_and_bitmap() {
        let block = [Some("ab"), None, Some(""), Some("xyz")];
        let (meta, chars) = build(&block, StringEncoding::Utf8);
        assert_eq!(&meta[..4], &[2, 2, 2, 5]);
        assert_eq!(meta[4], 0b10010);
        assert_eq!(chars, b"abxyz");
    }

    #[test]
    fn test_no_na_leaves_summary_clear() {
        let block = [Some("a"); 32];
        let (meta, _) = build(&block, StringEncoding::Utf8);
        assert_eq!(&meta[32..], &[0, 0]);
    }

    #[test]
    fn test_summary_bit_on_word_boundary() {
        let mut block = vec![Some("v"); 64];
        block[63] = None;
        let (meta, chars) = build(&block, StringEncoding::Utf8);
        assert_eq!(meta.len(), 64 + 3);
        assert_eq!(meta[65], 1u32 << 31);
        assert_eq!(meta[66], 1);

        let out = decode(&meta, 64, &chars, 30, 63);
        assert_eq!(out.len(), 34);
        assert_eq!(out[33], None);
        assert!(out[..33].iter().all(|v| v.as_deref() == Some("v")));
    }

    #[test]
    fn test_empty_string_differs_from_na() {
        let block = [Some(""), None, Some("")];
        let (meta, chars) = build(&block, StringEncoding::Utf8);
        let out = decode(&meta, 3, &chars, 0, 2);
        assert_eq!(out, vec![Some(String::new()), None, Some(String::new())]);
    }

    #[test]
    fn test_partial_range_crossing_cycles() {
        let block: Vec<Option<String>> = (0..100)
            .map(|i| if i % 7 == 0 { None } else { Some(i.to_string()) })
            .collect();
        let mut meta = vec![0u32; 100 + na_words(100)];
        let total = calculate_sizes(&block, StringEncoding::Native, &mut meta).unwrap();
        let mut chars = vec![0u8; total as usize];
        serialize_block(&block, StringEncoding::Native, &meta[..100], &mut chars);

        let out = decode(&meta, 100, &chars, 5, 70);
        assert_eq!(out, block[5..=70].to_vec());
    }

    #[test]
    fn test_latin1() {
        let block = [Some("caf\u{e9}"), Some("\u{ff}")];
        let (meta, chars) = build(&block, StringEncoding::Latin1);
        assert_eq!(&meta[..2], &[4, 5]);
        assert_eq!(chars, vec![b'c', b'a', b'f', 0xe9, 0xff]);

        let decoder = BlockDecoder::new(&meta, 2, &chars, StringEncoding::Latin1).unwrap();
        let mut out = Vec::new();
        decoder.decode_into(0, 1, &mut out).unwrap();
        assert_eq!(out, vec![Some("caf\u{e9}".to_string()), Some("\u{ff}".to_string())]);

        let mut meta = vec![0u32; 1 + na_words(1)];
        assert!(matches!(
            calculate_sizes(&[Some("\u{20ac}")], StringEncoding::Latin1, &mut meta),
            Err(BlockcolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_offsets_past_data_are_rejected() {
        let meta = [3u32, 9, 0];
        let decoder = BlockDecoder::new(&meta, 2, b"abcdef", StringEncoding::Utf8).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            decoder.decode_into(0, 1, &mut out),
            Err(BlockcolError::FormatError(_))
        ));
    }

    #[test]
    fn test_decreasing_sizes_are_rejected() {
        assert!(validate_sizes(&[0, 4, 4, 9]).is_ok());
        assert!(matches!(
            validate_sizes(&[3, 9, 2]),
            Err(BlockcolError::FormatError(_))
        ));
        let meta = [5u32, 1, 0];
        assert!(BlockDecoder::new(&meta, 2, b"abcde", StringEncoding::Utf8).is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let meta = [2u32, 0];
        let decoder = BlockDecoder::new(&meta, 1, &[0xc3, 0x28], StringEncoding::Utf8).unwrap();
        let mut out = Vec::new();
        assert!(decoder.decode_into(0, 0, &mut out).is_err());
    }
}
