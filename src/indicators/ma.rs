// =============================================================================
// Moving Average — simple arithmetic mean over a trailing window
// =============================================================================

/// Simple moving average over `period` trailing closes. Returns `None` until
/// `closes.len() >= period`.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Full SMA series, one value per input index once warmed up (`None` before).
pub fn sma_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }
    let mut out = Vec::with_capacity(closes.len());
    let mut running = 0.0_f64;
    for (i, &c) in closes.iter().enumerate() {
        running += c;
        if i >= period {
            running -= closes[i - period];
        }
        if i + 1 >= period {
            out.push(Some(running / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warms_up() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[1.0, 2.0, 3.0], 3), Some(2.0));
    }

    #[test]
    fn sma_uses_trailing_window() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&closes, 2), Some(4.5));
    }

    #[test]
    fn sma_series_matches_scalar_sma() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let series = sma_series(&closes, 3);
        assert_eq!(series, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
        for i in 0..closes.len() {
            assert_eq!(series[i], sma(&closes[..=i], 3));
        }
    }

    #[test]
    fn zero_period_is_always_none() {
        assert_eq!(sma(&[1.0, 2.0, 3.0], 0), None);
        assert_eq!(sma_series(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }
}
