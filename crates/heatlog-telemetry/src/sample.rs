//! Parsed telemetry rows.

use std::collections::BTreeMap;

use crate::{metric::Metric, time::Timestamp};

/// One row of telemetry: a timestamp and the value of every resolved metric.
///
/// A `None` value marks a cell that was empty or not numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: Timestamp,
    pub values: BTreeMap<Metric, Option<f64>>,
}

impl Sample {
    #[must_use]
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied().flatten()
    }
}

/// Parses a numeric telemetry cell.
///
/// Loggers often append units (`65.0 °C`, `45 %`), so only the leading number
/// is read, including an optional exponent (`6.5e1`). With `decimal_comma` a
/// comma is accepted as decimal separator. Empty cells, `N/A` and non-finite
/// numbers yield `None`. So does a number that goes on past what is read
/// (`65,5` without `decimal_comma`, `1.2.3`), rather than being truncated.
///
/// # Examples
///
/// ```
/// use heatlog_telemetry::sample::parse_reading;
///
/// assert_eq!(parse_reading("65.5 °C", false), Some(65.5));
/// assert_eq!(parse_reading("65,5", true), Some(65.5));
/// assert_eq!(parse_reading("65,5", false), None);
/// assert_eq!(parse_reading("N/A", false), None);
/// ```
#[must_use]
pub fn parse_reading(cell: &str, decimal_comma: bool) -> Option<f64> {
    let cell = cell.trim();
    let bytes = cell.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if let Some(&sep) = bytes.get(end)
        && (sep == b'.' || (decimal_comma && sep == b','))
    {
        frac_digits = digits(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if let Some(b'e' | b'E') = bytes.get(end) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits(end + 1 + sign);
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }
    // a separator followed by a digit continues a number this reader does not accept
    if matches!(bytes.get(end), Some(b'.' | b','))
        && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
    {
        return None;
    }
    cell[..end]
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
