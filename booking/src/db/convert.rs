/* =========================
Numeric safety helpers
========================= */

use anyhow::anyhow;

pub fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        return Err(anyhow!("negative i64 where u64 expected: {v}"));
    }
    Ok(v as u64)
}

pub fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        return Err(anyhow!("u64 too large for i64: {v}"));
    }
    Ok(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_are_rejected() {
        assert!(i64_to_u64(-1).is_err());
        assert_eq!(i64_to_u64(0).unwrap(), 0);
    }

    #[test]
    fn values_above_i64_max_are_rejected() {
        assert!(u64_to_i64(u64::MAX).is_err());
        assert_eq!(u64_to_i64(i64::MAX as u64).unwrap(), i64::MAX);
    }
}
