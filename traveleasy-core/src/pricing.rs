/// Fare per kilometre per seat when no rate is configured.
pub const DEFAULT_RATE_PER_KM: f64 = 26.0;

/// Total fare for a booking: distance × rate × seats, rounded to paise.
pub fn quote(kilometers: f64, rate_per_km: f64, seats: u32) -> f64 {
    round_cents(kilometers * rate_per_km * f64::from(seats))
}

/// Two amounts are the same price when they differ by less than half a paisa.
pub fn matches(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.005
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_scales_with_seats() {
        assert_eq!(quote(120.0, DEFAULT_RATE_PER_KM, 1), 3120.0);
        assert_eq!(quote(120.0, DEFAULT_RATE_PER_KM, 3), 9360.0);
    }

    #[test]
    fn test_quote_rounds_fractional_distance() {
        assert_eq!(quote(12.345, 10.0, 1), 123.45);
        assert!(matches(quote(0.1, 0.2, 3), 0.06));
    }

    #[test]
    fn test_matches_tolerance() {
        assert!(matches(3120.0, 3120.004));
        assert!(!matches(3120.0, 3120.01));
    }
}
