// =============================================================================
// Volume Ratio — current volume relative to its trailing average
// =============================================================================
//
// ratio = volume[t] / SMA(volume, period)[t]
//
// Default period = 20. A ratio > 1 means above-average participation.

use super::ma::sma;

pub const DEFAULT_PERIOD: usize = 20;

/// Most recent volume ratio. `None` until `volumes.len() >= period`, or when
/// the trailing average is ~0 (no participation to compare against).
pub fn volume_ratio(volumes: &[f64], period: usize) -> Option<f64> {
    if volumes.is_empty() {
        return None;
    }
    let avg = sma(volumes, period)?;
    if avg.abs() < 1e-12 {
        return None;
    }
    let current = *volumes.last()?;
    Some(current / avg)
}

/// Volume ratio with the strategy's default period (20).
pub fn volume_ratio_default(volumes: &[f64]) -> Option<f64> {
    volume_ratio(volumes, DEFAULT_PERIOD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_returns_none() {
        assert!(volume_ratio(&[1.0, 2.0], 20).is_none());
    }

    #[test]
    fn double_volume_gives_ratio_two() {
        let mut volumes = vec![10.0; 20];
        *volumes.last_mut().unwrap() = 20.0;
        let ratio = volume_ratio(&volumes, 20).unwrap();
        // avg = (19*10 + 20)/20 = 10.5, current = 20 => ratio ~ 1.904...
        assert!((ratio - (20.0 / 10.5)).abs() < 1e-9);
    }

    #[test]
    fn zero_average_returns_none() {
        let volumes = vec![0.0; 20];
        assert!(volume_ratio(&volumes, 20).is_none());
    }

    #[test]
    fn default_uses_period_20() {
        let volumes: Vec<f64> = (1..=25).map(|i| i as f64).collect();
        assert_eq!(volume_ratio_default(&volumes), volume_ratio(&volumes, 20));
    }
}
