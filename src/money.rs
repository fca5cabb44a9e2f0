//! Integer minor-unit money types.
//!
//! The core compares and persists monetary amounts as integer minor units
//! (lamports for the native coin, raw integer units for SPL-style tokens).
//! Conversion to/from floating-point decimals happens only at the two edges
//! that need it: oracle price math and human-facing logging.

use serde::{Deserialize, Serialize};

/// Lamports: the native coin's minor unit (1 SOL = 1_000_000_000 lamports).
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// An amount of the native coin, represented in lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Lamports(pub u64);

impl Lamports {
    pub const ZERO: Lamports = Lamports(0);

    pub fn from_sol(sol: f64) -> Self {
        Lamports((sol.max(0.0) * LAMPORTS_PER_SOL as f64).round() as u64)
    }

    pub fn to_sol(self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    pub fn saturating_sub(self, rhs: Lamports) -> Lamports {
        Lamports(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_sub(self, rhs: Lamports) -> Option<Lamports> {
        self.0.checked_sub(rhs.0).map(Lamports)
    }
}

impl std::ops::Add for Lamports {
    type Output = Lamports;
    fn add(self, rhs: Lamports) -> Lamports {
        Lamports(self.0 + rhs.0)
    }
}

impl std::fmt::Display for Lamports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.9} SOL", self.to_sol())
    }
}

/// Raw integer units of an arbitrary SPL-style token, scaled by its `decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TokenUnits(pub u64);

impl TokenUnits {
    pub const ZERO: TokenUnits = TokenUnits(0);

    pub fn from_decimal(amount: f64, decimals: u8) -> Self {
        let scale = 10f64.powi(decimals as i32);
        TokenUnits((amount.max(0.0) * scale).round() as u64)
    }

    pub fn to_decimal(self, decimals: u8) -> f64 {
        let scale = 10f64.powi(decimals as i32);
        self.0 as f64 / scale
    }

    pub fn saturating_sub(self, rhs: TokenUnits) -> TokenUnits {
        TokenUnits(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamports_round_trip() {
        let l = Lamports::from_sol(1.5);
        assert_eq!(l.0, 1_500_000_000);
        assert!((l.to_sol() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn token_units_round_trip() {
        let u = TokenUnits::from_decimal(1234.56, 6);
        assert_eq!(u.0, 1_234_560_000);
        assert!((u.to_decimal(6) - 1234.56).abs() < 1e-6);
    }

    #[test]
    fn lamports_saturating_sub_never_underflows() {
        let a = Lamports(10);
        let b = Lamports(20);
        assert_eq!(a.saturating_sub(b), Lamports::ZERO);
    }
}
