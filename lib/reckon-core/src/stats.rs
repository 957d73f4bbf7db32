use crate::FrequencyTable;

/// Descriptive statistics over a frequency table.
///
/// All values are computed over the observed sizes, weighted by how often each size was observed. The standard
/// deviation divides the weighted sum of squared deviations by one less than the total number of observations, so a
/// table holding a single observation has a standard deviation of zero.
///
/// An empty table yields a minimum and maximum of zero, and a mean and standard deviation of NaN, which signals that
/// there is no data rather than an error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    /// Smallest observed size.
    pub min: i64,

    /// Largest observed size.
    pub max: i64,

    /// Weighted mean of the observed sizes.
    pub mean: f64,

    /// Weighted standard deviation of the observed sizes.
    pub std_dev: f64,
}

impl Statistics {
    /// Computes statistics over the given frequency table.
    pub fn compute(table: &FrequencyTable) -> Self {
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        let mut weighted_sum = 0i128;
        let mut count = 0u128;

        for (size, occurrences) in table.iter().filter(|(_, n)| *n > 0) {
            min = min.min(size);
            max = max.max(size);
            weighted_sum += i128::from(size) * i128::from(occurrences);
            count += u128::from(occurrences);
        }

        if count == 0 {
            return Self {
                min: 0,
                max: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
            };
        }

        let mean = weighted_sum as f64 / count as f64;
        let squared_deviations: f64 = table
            .iter()
            .map(|(size, occurrences)| {
                let deviation = size as f64 - mean;
                deviation * deviation * occurrences as f64
            })
            .sum();

        let std_dev = if count > 1 {
            (squared_deviations / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            min,
            max,
            mean,
            std_dev,
        }
    }
}
