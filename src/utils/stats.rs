use log::*;
use ndarray::{
    Array1,
    ArrayView2,
    Axis,
};
use num::Float;
use statrs::statistics::Statistics;

/// Computes the `q`-th percentile (0..=100) of `values`.
///
/// Uses linear interpolation between the closest ranks, which matches
/// numpy's default `np.percentile`. Non-finite values are ignored.
/// Returns `None` for an empty input or an out of range `q`.
pub fn percentile<F: Float>(
    values: &[F],
    q: f64,
) -> Option<F> {
    if !(0.0..=100.0).contains(&q) {
        warn!("Percentile {} is out of the [0, 100] range", q);
        return None;
    }
    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| {
        a.partial_cmp(b)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = F::from(rank - lower as f64)?;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Returns the inclusive `[percentile(low), percentile(high)]` band.
pub fn percentile_band<F: Float>(
    values: &[F],
    low: f64,
    high: f64,
) -> Option<(F, F)> {
    Some((percentile(values, low)?, percentile(values, high)?))
}

/// Arithmetic mean which refuses to produce NaN.
pub fn finite_mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: std::borrow::Borrow<f64>, {
    let mean = values.mean();
    if mean.is_finite() {
        Some(mean)
    }
    else {
        None
    }
}

/// Mean across rows (replicates) for every column (bin).
///
/// An empty matrix yields an empty vector.
pub fn column_means(matrix: ArrayView2<f64>) -> Array1<f64> {
    matrix
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(matrix.ncols()))
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn percentile_matches_linear_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_approx_eq!(percentile(&values, 100.0).unwrap(), 4.0);
        assert_approx_eq!(percentile(&values, 50.0).unwrap(), 2.5);
        // rank = 0.8 * 3 = 2.4
        assert_approx_eq!(percentile(&values, 80.0).unwrap(), 3.4);
    }

    #[test]
    fn percentile_ignores_order_and_nan() {
        let values = vec![4.0, f64::NAN, 1.0, 3.0, 2.0];
        assert_approx_eq!(percentile(&values, 50.0).unwrap(), 2.5);
    }

    #[test]
    fn percentile_of_nothing() {
        let values: Vec<f64> = vec![];
        assert!(percentile(&values, 50.0).is_none());
        assert!(percentile(&[1.0f64], 101.0).is_none());
    }

    #[test]
    fn band_of_constant_values_is_a_point() {
        let values = vec![7.0f32; 10];
        let (low, high) = percentile_band(&values, 2.5, 97.5).unwrap();
        assert_eq!(low, 7.0);
        assert_eq!(high, 7.0);
    }

    #[test]
    fn means() {
        assert_approx_eq!(finite_mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
        assert!(finite_mean(&Vec::<f64>::new()).is_none());

        let matrix = array![[1.0, 2.0], [3.0, 6.0]];
        assert_eq!(column_means(matrix.view()), array![2.0, 4.0]);
    }
}
