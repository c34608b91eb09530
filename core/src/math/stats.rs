pub struct StatsHelper;

impl StatsHelper {
    /// Mean over the finite entries; zero when none are finite.
    pub fn nan_mean(samples: &[f64]) -> f64 {
        let (sum, count) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Removes the finite mean and replaces non-finite entries with zero.
    pub fn centered(samples: &[f64]) -> Vec<f64> {
        let mean = Self::nan_mean(samples);
        samples
            .iter()
            .map(|&v| if v.is_finite() { v - mean } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_mean_skips_sentinels() {
        assert_eq!(StatsHelper::nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_eq!(StatsHelper::nan_mean(&[f64::NAN]), 0.0);
    }

    #[test]
    fn centered_zeroes_gaps() {
        assert_eq!(StatsHelper::centered(&[1.0, f64::NAN, 3.0]), vec![-1.0, 0.0, 1.0]);
    }
}
