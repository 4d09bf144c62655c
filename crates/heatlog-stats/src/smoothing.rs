//! Moving averages for smoothing noisy series.

/// Computes the trailing simple moving average of `values`.
///
/// The result has `values.len() - window + 1` entries; entry `i` is the mean
/// of `values[i..i + window]`. A running sum keeps this linear in the input
/// length.
///
/// # Returns
///
/// * `Some(averages)` - if `1 <= window <= values.len()`
/// * `None` - if `window` is zero or longer than the input
///
/// # Examples
///
/// ```
/// use heatlog_stats::smoothing::simple_moving_average;
///
/// let sma = simple_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
/// assert_eq!(sma, vec![2.0, 3.0, 4.0]);
///
/// assert_eq!(simple_moving_average(&[1.0, 2.0], 3), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn simple_moving_average(values: &[f64], window: usize) -> Option<Vec<f64>> {
    if window == 0 || window > values.len() {
        return None;
    }
    let w = window as f64;
    let mut sum = values[..window].iter().sum::<f64>();
    let mut averages = Vec::with_capacity(values.len() - window + 1);
    averages.push(sum / w);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        averages.push(sum / w);
    }
    Some(averages)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_window_of_one_is_identity() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(simple_moving_average(&values, 1).unwrap(), values.to_vec());
    }

    #[test]
    fn test_window_equal_to_length() {
        let sma = simple_moving_average(&[2.0, 4.0, 6.0], 3).unwrap();
        assert_eq!(sma.len(), 1);
        assert_abs_diff_eq!(sma[0], 4.0);
    }

    #[test]
    fn test_zero_window() {
        assert_eq!(simple_moving_average(&[1.0, 2.0, 3.0], 0), None);
    }

    #[test]
    fn test_constant_input_stays_constant() {
        let sma = simple_moving_average(&[70.0; 30], 10).unwrap();
        assert_eq!(sma.len(), 21);
        for v in sma {
            assert_abs_diff_eq!(v, 70.0, epsilon = 1e-9);
        }
    }
}
