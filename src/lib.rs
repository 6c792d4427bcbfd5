pub mod compress;
pub mod conf;
pub mod core;
pub mod io;
mod parallel;
pub mod sort;

#[cfg(feature = "testutil")]
pub mod testutil;

pub use io::column::{
    ColumnHeader, Factor, FactorColumnReader, FactorColumnWriter, FixedColumnReader,
    FixedColumnWriter, NA_CODE, StringColumnReader, StringColumnWriter, StringEncoding,
    read_factor_column, read_fixed_column, read_string_column, write_factor_column,
    write_fixed_column, write_string_column,
};
pub use sort::{
    RadixSorter, RowOrder, ThreadPolicy, radix_sort_logical, radix_sort_logical_with_order,
    radix_sort_u32, radix_sort_u64,
};
