use rayon::ThreadPool;
use rayon::prelude::*;

use crate::core::BlockcolError;

/// Missing logical value.
pub const LOGICAL_NA: i32 = i32::MIN;

/// Row numbers carried along by [`sort_logical_with_order`].
#[derive(Clone, Copy, Debug)]
pub enum RowOrder<'a> {
    /// Zero-based row positions `0..len`.
    Identity,
    /// Caller-supplied row numbers, one per value.
    Given(&'a [i32]),
}

/// Output rank of a logical value: NA, then FALSE, then TRUE.
fn rank(value: i32) -> Result<usize, BlockcolError> {
    match value {
        LOGICAL_NA => Ok(0),
        0 => Ok(1),
        1 => Ok(2),
        other => Err(BlockcolError::InvalidInput(format!(
            "{other} is not a logical value"
        ))),
    }
}

fn count_chunk(chunk: &[i32]) -> Result<[usize; 3], BlockcolError> {
    let mut counts = [0usize; 3];
    for value in chunk {
        counts[rank(*value)?] += 1;
    }
    Ok(counts)
}

fn count(values: &[i32], pool: Option<&ThreadPool>) -> Result<[usize; 3], BlockcolError> {
    let Some(pool) = pool else {
        return count_chunk(values);
    };
    let chunk_len = values.len().div_ceil(pool.current_num_threads().max(1)).max(1);
    pool.install(|| {
        values
            .par_chunks(chunk_len)
            .map(count_chunk)
            .try_reduce(|| [0; 3], |a, b| Ok([a[0] + b[0], a[1] + b[1], a[2] + b[2]]))
    })
}

fn fill(values: &mut [i32], counts: [usize; 3]) {
    let (na, rest) = values.split_at_mut(counts[0]);
    let (falses, trues) = rest.split_at_mut(counts[1]);
    na.fill(LOGICAL_NA);
    falses.fill(0);
    trues.fill(1);
}

/// Sort logical values in place as NA < FALSE < TRUE.
pub(crate) fn sort_logical(values: &mut [i32], pool: Option<&ThreadPool>) -> Result<(), BlockcolError> {
    let counts = count(values, pool)?;
    fill(values, counts);
    Ok(())
}

/// Stable logical sort that also permutes `order` the same way. Returns the
/// row numbers in sorted order.
pub(crate) fn sort_logical_with_order(
    values: &mut [i32],
    order: RowOrder<'_>,
    pool: Option<&ThreadPool>,
) -> Result<Vec<i32>, BlockcolError> {
    let len = values.len();
    if let RowOrder::Given(rows) = order {
        if rows.len() != len {
            return Err(BlockcolError::InvalidInput(format!(
                "order holds {} rows for {len} values",
                rows.len()
            )));
        }
    }
    if matches!(order, RowOrder::Identity) && i32::try_from(len).is_err() {
        return Err(BlockcolError::InvalidInput(format!(
            "{len} rows do not fit a 32-bit row number"
        )));
    }
    let row = |pos: usize| match order {
        RowOrder::Identity => pos as i32,
        RowOrder::Given(rows) => rows[pos],
    };

    let counts = count(values, pool)?;
    if counts.contains(&len) {
        return Ok((0..len).map(row).collect());
    }

    let mut cursor = [0, counts[0], counts[0] + counts[1]];
    let mut sorted_rows = vec![0i32; len];
    for (pos, value) in values.iter().enumerate() {
        let r = rank(*value)?;
        sorted_rows[cursor[r]] = row(pos);
        cursor[r] += 1;
    }
    fill(values, counts);
    Ok(sorted_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::build_pool;

    #[test]
    fn test_na_first() {
        let mut values = vec![1, LOGICAL_NA, 0, 1, LOGICAL_NA, 0];
        sort_logical(&mut values, None).unwrap();
        assert_eq!(values, vec![LOGICAL_NA, LOGICAL_NA, 0, 0, 1, 1]);
    }

    #[test]
    fn test_invalid_value() {
        let mut values = vec![0, 2, 1];
        assert!(matches!(
            sort_logical(&mut values, None),
            Err(BlockcolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_order_is_stable() {
        let mut values = vec![1, 0, LOGICAL_NA, 0, 1];
        let rows = sort_logical_with_order(&mut values, RowOrder::Identity, None).unwrap();
        assert_eq!(rows, vec![2, 1, 3, 0, 4]);
        assert_eq!(values, vec![LOGICAL_NA, 0, 0, 1, 1]);
    }

    #[test]
    fn test_given_order_is_carried() {
        let mut values = vec![1, 0, 1];
        let rows =
            sort_logical_with_order(&mut values, RowOrder::Given(&[10, 20, 30]), None).unwrap();
        assert_eq!(rows, vec![20, 10, 30]);

        let mut values = vec![1, 0];
        assert!(sort_logical_with_order(&mut values, RowOrder::Given(&[1]), None).is_err());
    }

    #[test]
    fn test_pool_counts() {
        let mut values: Vec<i32> = (0..10_000)
            .map(|i| match i % 3 {
                0 => LOGICAL_NA,
                1 => 0,
                _ => 1,
            })
            .collect();
        let pool = build_pool(4);
        sort_logical(&mut values, pool.as_ref()).unwrap();
        assert_eq!(values[3333], LOGICAL_NA);
        assert_eq!(values[3334], 0);
        assert_eq!(values[6666], 0);
        assert_eq!(values[6667], 1);
    }
}
