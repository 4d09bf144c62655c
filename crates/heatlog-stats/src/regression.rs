//! Ordinary least-squares line fitting.

/// A straight line `y = slope * x + intercept` fitted by least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Change in `y` per unit of `x`.
    pub slope: f64,
    /// Value of `y` at `x = 0`.
    pub intercept: f64,
    /// Coefficient of determination, in `[0, 1]`.
    ///
    /// `1.0` when every point lies on the line, including the degenerate case
    /// where all `y` values are equal.
    pub r_squared: f64,
}

impl LinearFit {
    /// Fits a line through `(x, y)` points.
    ///
    /// # Returns
    ///
    /// * `Some(LinearFit)` - if there are at least two points with distinct `x`
    /// * `None` - otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use heatlog_stats::regression::LinearFit;
    ///
    /// let fit = LinearFit::from_points([(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
    /// assert!((fit.slope - 2.0).abs() < 1e-12);
    /// assert!((fit.intercept - 1.0).abs() < 1e-12);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let points = points.into_iter().collect::<Vec<_>>();
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (x, y) in &points {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if sxx <= f64::EPSILON * n {
            return None;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let r_squared = if syy <= f64::EPSILON {
            1.0
        } else {
            ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
        };

        Some(Self {
            slope,
            intercept,
            r_squared,
        })
    }

    /// Evaluates the fitted line at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_too_few_points() {
        assert!(LinearFit::from_points([]).is_none());
        assert!(LinearFit::from_points([(1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_vertical_points_have_no_fit() {
        assert!(LinearFit::from_points([(1.0, 1.0), (1.0, 5.0), (1.0, 9.0)]).is_none());
    }

    #[test]
    fn test_flat_line() {
        let fit = LinearFit::from_points((0..10).map(|i| (f64::from(i), 70.0))).unwrap();
        assert_abs_diff_eq!(fit.slope, 0.0);
        assert_abs_diff_eq!(fit.intercept, 70.0);
        assert_abs_diff_eq!(fit.r_squared, 1.0);
    }

    #[test]
    fn test_noisy_rising_line() {
        let points = [(0.0, 60.0), (1.0, 61.5), (2.0, 61.0), (3.0, 63.0), (4.0, 64.5)];
        let fit = LinearFit::from_points(points).unwrap();
        assert!(fit.slope > 0.9 && fit.slope < 1.2, "slope {}", fit.slope);
        assert!(fit.r_squared > 0.8 && fit.r_squared <= 1.0);
        assert_abs_diff_eq!(fit.predict(0.0), fit.intercept);
    }
}
