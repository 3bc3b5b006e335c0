/// Slice a resolver-aware correlated-test vector by `[offset, offset+limit)`
/// (spec §4.2 step 3): `offset >= len` yields an empty page; `offset + limit
/// > len` yields the tail. The vector's full length is the page's
/// authoritative `total`, independent of the view-path's `COUNT(*) OVER()`
/// limitation (spec §9 Open Question).
pub fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;

    if offset >= items.len() {
        return (Vec::new(), total);
    }

    let end = (offset + limit).min(items.len());
    let page = items.into_iter().skip(offset).take(end - offset).collect();
    (page, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_slice_returns_requested_window() {
        let items = vec![1, 2, 3, 4, 5];
        let (page, total) = paginate(items, 1, 2);
        assert_eq!(page, vec![2, 3]);
        assert_eq!(total, 5);
    }

    #[test]
    fn offset_past_end_returns_empty_page_with_full_total() {
        let items = vec![1, 2, 3];
        let (page, total) = paginate(items, 10, 5);
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn offset_plus_limit_past_end_returns_tail() {
        let items = vec![1, 2, 3, 4];
        let (page, total) = paginate(items, 2, 10);
        assert_eq!(page, vec![3, 4]);
        assert_eq!(total, 4);
    }

    #[test]
    fn empty_input_returns_empty_page_and_zero_total() {
        let items: Vec<i32> = Vec::new();
        let (page, total) = paginate(items, 0, 10);
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn offset_exactly_at_len_returns_empty_page() {
        let items = vec![1, 2, 3];
        let (page, total) = paginate(items, 3, 10);
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }
}
