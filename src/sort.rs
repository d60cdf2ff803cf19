/// In-place stable insertion sort in ascending order.
///
/// Callers sort a sub-range by slicing, e.g. `insertion_sort(&mut xs[lo..=hi])`.
/// Quadratic in the worst case, which is fine for the short per-column ranges
/// this crate sorts.
pub fn insertion_sort<T: Ord>(xs: &mut [T]) {
    for k in 1..xs.len() {
        let mut idx = k;
        while idx > 0 && xs[idx - 1] > xs[idx] {
            xs.swap(idx - 1, idx);
            idx -= 1;
        }
    }
}

/// In-place stable insertion sort of `order` by two external key arrays.
///
/// `order` holds zero-based indices into `primary` and `secondary`. After the
/// call, for adjacent elements `a` then `b`: `primary[a] < primary[b]`, or
/// `primary[a] == primary[b]` and `secondary[a] <= secondary[b]`.
///
/// The key arrays are read-only and no allocation is performed. An index in
/// `order` that is out of range for either key array panics.
pub fn insertion_sort_by_keys<K: Ord>(order: &mut [usize], primary: &[K], secondary: &[K]) {
    for k in 1..order.len() {
        let mut idx = k;
        while idx > 0 {
            let cur = order[idx];
            let prev = order[idx - 1];
            let before = primary[cur] < primary[prev]
                || (primary[cur] == primary[prev] && secondary[cur] < secondary[prev]);
            if !before {
                break;
            }
            order.swap(idx - 1, idx);
            idx -= 1;
        }
    }
}
