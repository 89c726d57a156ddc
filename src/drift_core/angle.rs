// ==============================================================================
// angle.rs — SCALAR HELPERS (SIGN, ANGLE WRAP, ZERO TESTS)
// ------------------------------------------------------------------------------
// sign(a):
// - -1 for a < 0, +1 otherwise. sign(0) = +1 is load-bearing: the tire and
//   slip-angle branches pick their direction from it at exact-zero inputs.
//
// wrap_to_pi(a):
// - ((a + π) mod 2π) − π with a floored modulo, landing in (-π, π].
//
// ZeroPolicy:
// - Every "is this zero" / "are these equal" test in the solver goes through
//   here, so the exact float comparisons and the tolerance variant share one
//   switch.
// ==============================================================================

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

#[inline]
pub fn sign(a: f64) -> f64 {
    if a < 0.0 { -1.0 } else { 1.0 }
}

/// Map an angle into `(-π, π]`.
#[inline]
pub fn wrap_to_pi(a: f64) -> f64 {
    if !a.is_finite() {
        return a;
    }
    // already in range: return untouched so wrapping is exactly idempotent
    if a > -PI && a <= PI {
        return a;
    }
    let wrapped = (a + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// How the solver decides that a float "is zero".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "eps", rename_all = "snake_case")]
pub enum ZeroPolicy {
    /// Bare `== 0.0` comparisons.
    Exact,
    /// `|v| <= eps`.
    Tolerance(f64),
}

impl Default for ZeroPolicy {
    fn default() -> Self {
        ZeroPolicy::Tolerance(1e-9)
    }
}

impl ZeroPolicy {
    #[inline]
    pub fn is_zero(self, v: f64) -> bool {
        match self {
            ZeroPolicy::Exact => v == 0.0,
            ZeroPolicy::Tolerance(eps) => v.abs() <= eps,
        }
    }

    #[inline]
    pub fn same(self, a: f64, b: f64) -> bool {
        match self {
            ZeroPolicy::Exact => a == b,
            ZeroPolicy::Tolerance(eps) => (a - b).abs() <= eps,
        }
    }
}
