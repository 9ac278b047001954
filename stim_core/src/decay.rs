//! Exponential half-life decay model.
//!
//! remaining = amount * 0.5^(elapsed_hours / HALF_LIFE_HOURS)

use crate::clock::SECONDS_PER_HOUR;
use crate::Dose;

/// Caffeine half-life in hours
pub const HALF_LIFE_HOURS: f64 = 6.0;

/// Decay an amount over a number of hours
pub fn decay_amount(amount: f64, elapsed_hours: f64) -> f64 {
    amount * 0.5_f64.powf(elapsed_hours / HALF_LIFE_HOURS)
}

/// Amount of `dose` still present at `at`
///
/// A dose timestamped after `at` has not been taken yet and contributes zero.
pub fn remaining_after(dose: &Dose, at: f64) -> f64 {
    if dose.timestamp > at {
        return 0.0;
    }
    decay_amount(dose.amount, (at - dose.timestamp) / SECONDS_PER_HOUR)
}

/// Total level at `at`, rounded to 2 decimal places
pub fn current_level(doses: &[Dose], at: f64) -> f64 {
    // f64's Sum starts at -0.0; fold from +0.0 so an empty set prints as 0
    let total = doses
        .iter()
        .map(|dose| remaining_after(dose, at))
        .fold(0.0, |acc, x| acc + x);
    round2(total)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
