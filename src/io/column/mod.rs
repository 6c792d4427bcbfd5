pub mod factor;
pub mod fixed;
mod header;
mod meta;
mod ordered;
pub mod string;

pub use factor::{
    Factor, FactorColumnReader, FactorColumnWriter, NA_CODE, read_factor_column, write_factor_column,
};
pub use fixed::{FixedColumnReader, FixedColumnWriter, read_fixed_column, write_fixed_column};
pub use header::{COLUMN_HEADER_SIZE, ColumnHeader, StringEncoding};
pub use string::{StringColumnReader, StringColumnWriter, read_string_column, write_string_column};

use crate::core::BlockcolError;

/// Grow `buffer` to hold at least `required` bytes, with 10% headroom so that
/// slowly growing jobs do not reallocate every time.
pub(crate) fn grow_buffer(buffer: &mut Vec<u8>, required: usize) {
    if buffer.len() < required {
        buffer.resize(required + required / 10, 0);
    }
}

/// Empty vector with room for `len` elements. Sizes taken from a column
/// that cannot be allocated are reported as a format error.
pub(crate) fn try_with_capacity<T>(len: usize) -> Result<Vec<T>, BlockcolError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| BlockcolError::FormatError(format!("cannot allocate {len} elements: {e}")))?;
    Ok(buffer)
}

/// Refill `buffer` with `len` copies of `value`, failing like
/// [`try_with_capacity`] instead of aborting.
pub(crate) fn try_resize<T: Clone>(buffer: &mut Vec<T>, len: usize, value: T) -> Result<(), BlockcolError> {
    buffer.clear();
    buffer
        .try_reserve(len)
        .map_err(|e| BlockcolError::FormatError(format!("cannot allocate {len} elements: {e}")))?;
    buffer.resize(len, value);
    Ok(())
}

/// Convert a size read from a column to `usize`.
pub(crate) fn to_usize(value: u64, what: &str) -> Result<usize, BlockcolError> {
    usize::try_from(value)
        .map_err(|_| BlockcolError::FormatError(format!("{what} of {value} does not fit in memory")))
}
