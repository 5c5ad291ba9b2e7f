//! Probabilistic drop/corrupt fault injection applied on both the send and receive
//! paths of every link, independent of transport.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    pub send_drop_rate: f64,
    pub send_corrupt_rate: f64,
    pub send_corrupt_amount: usize,
    pub receive_drop_rate: f64,
    pub receive_corrupt_rate: f64,
    pub receive_corrupt_amount: usize,
    pub trace_corrupt_size_limit: usize,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            send_drop_rate: 0.0,
            send_corrupt_rate: 0.0,
            send_corrupt_amount: 0,
            receive_drop_rate: 0.0,
            receive_corrupt_rate: 0.0,
            receive_corrupt_amount: 0,
            trace_corrupt_size_limit: 256,
        }
    }
}

/// Decides, per `rate` in `[0,1]`, whether the current package should be dropped.
pub fn roll_drop(rate: f64) -> bool {
    rate > 0.0 && rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
}

/// Decides whether to corrupt, and if so overwrites `amount` random byte positions of
/// `cipher_text` with fresh random bytes — length and trace/span metadata untouched.
pub fn maybe_corrupt(cipher_text: &mut [u8], rate: f64, amount: usize) -> bool {
    if rate <= 0.0 || cipher_text.is_empty() || amount == 0 {
        return false;
    }
    if !rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0)) {
        return false;
    }
    let mut rng = rand::thread_rng();
    for _ in 0..amount.min(cipher_text.len()) {
        let idx = rng.gen_range(0..cipher_text.len());
        cipher_text[idx] = rng.gen();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_never_drops() {
        for _ in 0..1000 {
            assert!(!roll_drop(0.0));
        }
    }

    #[test]
    fn one_rate_always_drops() {
        for _ in 0..100 {
            assert!(roll_drop(1.0));
        }
    }

    #[test]
    fn corrupt_preserves_length() {
        let mut data = vec![0u8; 32];
        maybe_corrupt(&mut data, 1.0, 8);
        assert_eq!(data.len(), 32);
    }

    #[test]
    fn zero_amount_never_corrupts() {
        let mut data = vec![1, 2, 3];
        let original = data.clone();
        assert!(!maybe_corrupt(&mut data, 1.0, 0));
        assert_eq!(data, original);
    }
}
