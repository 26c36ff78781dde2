//! Splitting a run's file list into fixed-size chunks.

/// Number of chunks needed for `len` items at `size` per chunk.
/// A size of zero is treated as one.
pub fn chunk_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}

/// Splits `items` into consecutive chunks of at most `size` items,
/// preserving order.
pub fn plan_chunks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}
