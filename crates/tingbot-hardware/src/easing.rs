//! Ease-out interpolation for the backlight animation

/// Quadratic ease-out: fast start, decelerating into the target
///
/// `t` is clamped to `0.0..=1.0`; the result stays in the same range and is
/// monotonic, so an animation never overshoots.
pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * (2.0 - t)
}

/// Value between `from` and `to` at `progress` along the eased curve
pub fn interpolate(from: u32, to: u32, progress: f64) -> u32 {
    let from_f = f64::from(from);
    let span = f64::from(to) - from_f;
    (from_f + span * ease_out_quad(progress)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(ease_out_quad(0.0), 0.0);
        assert_eq!(ease_out_quad(1.0), 1.0);
        assert_eq!(ease_out_quad(-3.0), 0.0);
        assert_eq!(ease_out_quad(7.0), 1.0);
        assert_eq!(interpolate(100, 900, 0.0), 100);
        assert_eq!(interpolate(100, 900, 1.0), 900);
    }

    #[test]
    fn test_decelerates() {
        let first_half = ease_out_quad(0.5) - ease_out_quad(0.0);
        let second_half = ease_out_quad(1.0) - ease_out_quad(0.5);
        assert!(first_half > second_half);
        assert_eq!(ease_out_quad(0.5), 0.75);
    }

    #[test]
    fn test_monotonic_without_overshoot() {
        for (from, to) in [(0u32, 65536u32), (65536, 0), (40, 41), (500, 500)] {
            let mut previous = from;
            for step in 0..=100 {
                let value = interpolate(from, to, f64::from(step) / 100.0);
                assert!(value >= from.min(to) && value <= from.max(to));
                if to >= from {
                    assert!(value >= previous);
                } else {
                    assert!(value <= previous);
                }
                previous = value;
            }
        }
    }
}
