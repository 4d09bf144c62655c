//! Pearson product-moment correlation.

/// Computes the Pearson correlation coefficient of paired observations.
///
/// # Returns
///
/// * `Some(r)` with `r` clamped to `[-1, 1]` - if there are at least two pairs
///   and both sides have non-zero variance
/// * `None` - otherwise (the coefficient is undefined)
///
/// # Panics
///
/// Panics if `xs` and `ys` have different lengths.
///
/// # Examples
///
/// ```
/// use heatlog_stats::correlation::pearson;
///
/// let xs = [1.0, 2.0, 3.0, 4.0];
/// let ys = [10.0, 20.0, 30.0, 40.0];
/// assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
///
/// let flat = [5.0, 5.0, 5.0, 5.0];
/// assert_eq!(pearson(&xs, &flat), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    assert_eq!(xs.len(), ys.len(), "paired slices must have equal length");
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}
