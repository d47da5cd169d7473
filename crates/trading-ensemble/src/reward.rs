/// Map a realized return into a reward in [0, 1].
///
/// A zero return maps to 0.5; `scale` sets how quickly the reward saturates.
pub fn squash_reward(ret: f64, scale: f64) -> f64 {
    if !ret.is_finite() || scale <= 0.0 {
        return 0.5;
    }
    0.5 * (1.0 + (ret / scale).tanh())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squash_reward() {
        assert_eq!(squash_reward(0.0, 0.002), 0.5);
        assert!(squash_reward(0.002, 0.002) > 0.8);
        assert!(squash_reward(-0.002, 0.002) < 0.2);
        assert!(squash_reward(1.0, 0.002) <= 1.0);
        assert!(squash_reward(-1.0, 0.002) >= 0.0);
        assert_eq!(squash_reward(f64::NAN, 0.002), 0.5);
    }
}
