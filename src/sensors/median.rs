//! Tumbling-window median.
//!
//! The window is consumed, not peeked: once `window_length` samples are
//! buffered they are drained in one go, sorted and reduced to a median.
//! The next evaluation needs `window_length` fresh samples.
//!
//! Even-length windows use the floor of the mean of the two middle
//! elements (rounded toward negative infinity, computed in `i64`).

use super::ring::SampleRingBuffer;

/// Median of an already-sorted slice. `None` for an empty slice.
pub fn median(sorted: &[i32]) -> Option<i32> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        return Some(sorted[mid]);
    }
    let sum = i64::from(sorted[mid - 1]) + i64::from(sorted[mid]);
    Some(sum.div_euclid(2) as i32)
}

/// Drain one full window from `ring` and return its median.
///
/// Returns `None` while fewer than `window_length` samples are buffered
/// ("not enough data yet"); the buffer is untouched in that case.
pub fn evaluate_window(ring: &mut SampleRingBuffer, window_length: usize) -> Option<i32> {
    if window_length == 0 || ring.len() < window_length {
        return None;
    }
    let mut window = ring.drain_n(window_length).ok()?;
    // `sort` is stable; duplicates are retained.
    window.sort();
    median(&window)
}
