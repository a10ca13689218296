//! Binary search over a monotone function.

/// Finds the smallest `x` in `start .. limit` such that `f(x) >= value`;
/// requires that `f` be monotonically non-decreasing over the interval.
///
/// Does not call `f` outside the interval.
pub fn binary_search_function<F>(mut start: u64, mut limit: u64, value: u64, f: F) -> Option<u64>
where
    F: Fn(u64) -> u64,
{
    if start >= limit {
        return None;
    }
    if f(start) >= value {
        return Some(start);
    }

    // The answer is not `start`, so `mid - 1` stays in the domain of `f`
    // for every probe below.
    start += 1;

    while start < limit {
        let mid = start + (limit - start) / 2;

        if f(mid) >= value {
            if f(mid - 1) < value {
                return Some(mid);
            }
            limit = mid;
        } else {
            start = mid + 1;
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn search_slice(value: u64, slice: &[u64]) -> Option<u64> {
        binary_search_function(0, slice.len() as u64, value, |i| slice[i as usize])
    }

    #[test]
    fn step_functions() {
        for len in 0..24u64 {
            for boundary in 0..len {
                let slice: Vec<u64> = (0..len).map(|i| (i >= boundary) as u64).collect();
                assert_eq!(Some(boundary), search_slice(1, &slice));
            }
            let zeros = vec![0u64; len as usize];
            assert_eq!(None, search_slice(1, &zeros));
        }
    }

    #[test]
    fn identity_function() {
        for len in 0..24u64 {
            let slice: Vec<u64> = (0..len).collect();
            for i in 0..len {
                assert_eq!(Some(i), search_slice(i, &slice));
            }
            assert_eq!(None, search_slice(len, &slice));
        }
    }

    #[test]
    fn overshoot_lands_on_first_reaching_probe() {
        let slice = [0u64, 0, 2, 2, 5];
        assert_eq!(Some(2), search_slice(1, &slice));
        assert_eq!(Some(2), search_slice(2, &slice));
        assert_eq!(Some(4), search_slice(3, &slice));
    }
}
