//! Cross-store parity validation.

/// Compare vector-store and graph-store chunk counts.
///
/// The tolerance `epsilon` accounts only for chunks whose embedding failed
/// (they may be retried out-of-band and re-published). A difference beyond
/// it is a validation mismatch: recorded, not fatal.
pub(crate) fn check_parity(
    vector_count: u64,
    graph_count: u64,
    epsilon: u64,
) -> Result<(), String> {
    let diff = vector_count.abs_diff(graph_count);
    if diff <= epsilon {
        Ok(())
    } else {
        Err(format!(
            "cross-store mismatch: vector={vector_count} graph={graph_count} tolerance={epsilon}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_counts_pass() {
        assert!(check_parity(42, 42, 0).is_ok());
    }

    #[test]
    fn difference_within_failed_tolerance_passes() {
        assert!(check_parity(40, 42, 2).is_ok());
    }

    #[test]
    fn difference_beyond_tolerance_fails_with_counts() {
        let err = check_parity(10, 42, 2).unwrap_err();
        assert!(err.contains("vector=10"));
        assert!(err.contains("graph=42"));
    }
}
