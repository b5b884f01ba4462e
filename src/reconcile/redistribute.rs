/// Split `total` across `slots` entries as evenly as integers allow.
///
/// Every entry gets `total / slots`; the first `total % slots` entries (in
/// the order given) get one more. The result always sums to `total`. With
/// no slots there is nowhere to put the quantity and the result is empty.
pub fn split_evenly(total: u32, slots: usize) -> Vec<u32> {
    if slots == 0 {
        return Vec::new();
    }
    let n = slots as u64;
    let base = (u64::from(total) / n) as u32;
    let extra = (u64::from(total) % n) as usize;
    (0..slots)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_goes_to_leading_slots() {
        assert_eq!(split_evenly(7, 2), vec![4, 3]);
        assert_eq!(split_evenly(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(split_evenly(63, 1), vec![63]);
    }

    #[test]
    fn test_fewer_units_than_slots() {
        assert_eq!(split_evenly(2, 5), vec![1, 1, 0, 0, 0]);
        assert_eq!(split_evenly(0, 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_no_slots_drops_quantity() {
        assert!(split_evenly(12, 0).is_empty());
    }

    #[test]
    fn test_sum_is_conserved_and_shares_differ_by_at_most_one() {
        for total in [0u32, 1, 2, 7, 99, 100, 1001, u32::MAX] {
            for slots in 1..=9usize {
                let shares = split_evenly(total, slots);
                assert_eq!(shares.len(), slots);

                let sum: u64 = shares.iter().map(|&s| u64::from(s)).sum();
                assert_eq!(sum, u64::from(total), "total={} slots={}", total, slots);

                let base = (u64::from(total) / slots as u64) as u32;
                assert!(
                    shares.iter().all(|&s| s == base || s == base + 1),
                    "total={} slots={} shares={:?}",
                    total,
                    slots,
                    shares
                );
            }
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(split_evenly(17, 4), split_evenly(17, 4));
    }
}
