use std::fmt::Display;

use itertools::Itertools;
use ndarray::{
    Array1,
    Array2,
    ArrayView1,
    ArrayViewMut1,
    Axis,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::enums::Condition;
use super::typedef::{
    BinIndex,
    CountType,
    CovType,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::utils::column_means;

/// Typed (condition, replicate) coordinate of a sample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SampleId {
    pub condition: Condition,
    pub replicate: usize,
}

impl SampleId {
    pub fn new(
        condition: Condition,
        replicate: usize,
    ) -> Self {
        Self {
            condition,
            replicate,
        }
    }
}

impl Display for SampleId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "s{}-rep{}", self.condition, self.replicate)
    }
}

/// Coverage of a single replicate, one value per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCoverage {
    id:     SampleId,
    values: Array1<CovType>,
}

impl SampleCoverage {
    pub fn new(
        id: SampleId,
        values: Array1<CovType>,
    ) -> Self {
        Self { id, values }
    }

    /// Wraps raw read counts.
    pub fn from_counts(
        id: SampleId,
        counts: &[CountType],
    ) -> Self {
        Self::new(
            id,
            counts
                .iter()
                .map(|&c| c as CovType)
                .collect(),
        )
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn values(&self) -> ArrayView1<CovType> {
        self.values.view()
    }

    pub fn values_mut(&mut self) -> ArrayViewMut1<CovType> {
        self.values.view_mut()
    }

    pub fn n_bins(&self) -> usize {
        self.values.len()
    }

    pub fn total(&self) -> CovType {
        self.values.sum()
    }

    pub fn scale(
        &mut self,
        factor: CovType,
    ) {
        self.values.mapv_inplace(|v| v * factor);
    }

    /// Subtracts `other` bin-wise; results below zero are clamped to zero.
    pub fn subtract_clamped(
        &mut self,
        other: &SampleCoverage,
    ) -> DiffPeakResult<()> {
        if other.n_bins() != self.n_bins() {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "cannot subtract {} bins of {} from {} bins of {}",
                other.n_bins(),
                other.id,
                self.n_bins(),
                self.id
            )));
        }
        self.values
            .zip_mut_with(&other.values, |v, o| *v = (*v - o).max(0.0));
        Ok(())
    }
}

/// Replicates of both conditions, each condition stored as a
/// replicates x bins matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMatrix {
    first:  Array2<CovType>,
    second: Array2<CovType>,
}

impl CoverageMatrix {
    pub fn new(
        first: Array2<CovType>,
        second: Array2<CovType>,
    ) -> DiffPeakResult<Self> {
        if first.ncols() != second.ncols() {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "conditions have different bin counts: {} vs {}",
                first.ncols(),
                second.ncols()
            )));
        }
        if first.nrows() == 0 || second.nrows() == 0 {
            return Err(DiffPeakError::ShapeMismatch(
                "every condition needs at least one replicate".to_string(),
            ));
        }
        Ok(Self { first, second })
    }

    /// Stacks samples into matrices. Rows follow replicate order within
    /// each condition regardless of the order of `samples`.
    pub fn from_samples(samples: Vec<SampleCoverage>) -> DiffPeakResult<Self> {
        let n_bins = samples
            .first()
            .map(|s| s.n_bins())
            .unwrap_or(0);
        if let Some(bad) = samples.iter().find(|s| s.n_bins() != n_bins) {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "sample {} has {} bins, expected {}",
                bad.id(),
                bad.n_bins(),
                n_bins
            )));
        }

        let mut grouped = samples
            .into_iter()
            .sorted_by_key(|s| s.id())
            .into_group_map_by(|s| s.id().condition);

        let mut stack = |condition: Condition| -> DiffPeakResult<Array2<CovType>> {
            let rows = grouped.remove(&condition).unwrap_or_default();
            for (expected, sample) in rows.iter().enumerate() {
                if sample.id().replicate != expected {
                    return Err(DiffPeakError::ShapeMismatch(format!(
                        "condition {} is missing replicate {}",
                        condition, expected
                    )));
                }
            }
            let mut matrix = Array2::zeros((rows.len(), n_bins));
            for (mut row, sample) in matrix.rows_mut().into_iter().zip(rows) {
                row.assign(&sample.values);
            }
            Ok(matrix)
        };

        let first = stack(Condition::First)?;
        let second = stack(Condition::Second)?;
        Self::new(first, second)
    }

    pub fn condition(
        &self,
        condition: Condition,
    ) -> &Array2<CovType> {
        match condition {
            Condition::First => &self.first,
            Condition::Second => &self.second,
        }
    }

    pub fn condition_mut(
        &mut self,
        condition: Condition,
    ) -> &mut Array2<CovType> {
        match condition {
            Condition::First => &mut self.first,
            Condition::Second => &mut self.second,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.first.ncols()
    }

    pub fn n_replicates(
        &self,
        condition: Condition,
    ) -> usize {
        self.condition(condition).nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.first.nrows() + self.second.nrows()
    }

    /// All sample ids, first condition first, replicates in order.
    pub fn sample_ids(&self) -> Vec<SampleId> {
        Condition::BOTH
            .iter()
            .flat_map(|&c| (0..self.n_replicates(c)).map(move |r| SampleId::new(c, r)))
            .collect()
    }

    pub fn sample(
        &self,
        id: SampleId,
    ) -> Option<ArrayView1<CovType>> {
        let matrix = self.condition(id.condition);
        (id.replicate < matrix.nrows()).then(|| matrix.row(id.replicate))
    }

    pub fn sample_mut(
        &mut self,
        id: SampleId,
    ) -> Option<ArrayViewMut1<CovType>> {
        let matrix = self.condition_mut(id.condition);
        if id.replicate < matrix.nrows() {
            Some(matrix.row_mut(id.replicate))
        }
        else {
            None
        }
    }

    /// Multiplies every sample row by its factor, given in
    /// [`Self::sample_ids`] order.
    pub fn scale_samples(
        &mut self,
        factors: &[CovType],
    ) -> DiffPeakResult<()> {
        if factors.len() != self.n_samples() {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "{} scaling factors for {} samples",
                factors.len(),
                self.n_samples()
            )));
        }
        for (id, factor) in self.sample_ids().into_iter().zip(factors) {
            if let Some(mut row) = self.sample_mut(id) {
                row.mapv_inplace(|v| v * factor);
            }
        }
        Ok(())
    }

    /// Mean over replicates for each bin.
    pub fn bin_means(
        &self,
        condition: Condition,
    ) -> Array1<CovType> {
        column_means(self.condition(condition).view())
    }

    /// Maximum column sum of the first condition plus that of the second.
    pub fn max_colsum(&self) -> CovType {
        Condition::BOTH
            .iter()
            .map(|&c| {
                self.condition(c)
                    .sum_axis(Axis(0))
                    .iter()
                    .copied()
                    .fold(0.0, CovType::max)
            })
            .sum()
    }

    /// Truncated mean coverage of both conditions at `bin`.
    pub fn rounded_means(
        &self,
        bin: BinIndex,
    ) -> (CountType, CountType) {
        let mean = |c: Condition| {
            self.condition(c)
                .column(bin)
                .mean()
                .unwrap_or(0.0)
                .max(0.0) as CountType
        };
        (mean(Condition::First), mean(Condition::Second))
    }

    /// Observations for the classifier: one row per selected bin, columns
    /// are the replicates of the first condition followed by the second.
    /// `None` selects every bin.
    ///
    /// # Errors
    ///
    /// [`DiffPeakError::ShapeMismatch`] if a bin lies outside the matrix.
    pub fn observations(
        &self,
        bins: Option<&[BinIndex]>,
    ) -> DiffPeakResult<Array2<CovType>> {
        let all = (0..self.n_bins()).collect_vec();
        let bins = bins.unwrap_or(&all);
        if let Some(bad) = bins.iter().find(|&&bin| bin >= self.n_bins()) {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "bin {} is out of range for {} bins",
                bad,
                self.n_bins()
            )));
        }
        let first = self.first.select(Axis(1), bins);
        let second = self.second.select(Axis(1), bins);
        Ok(ndarray::concatenate(Axis(0), &[first.view(), second.view()])
            .map(|m| m.reversed_axes())
            .unwrap_or_else(|_| Array2::zeros((bins.len(), self.n_samples()))))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn sample(
        condition: Condition,
        replicate: usize,
        values: &[CountType],
    ) -> SampleCoverage {
        SampleCoverage::from_counts(SampleId::new(condition, replicate), values)
    }

    #[test]
    fn subtraction_is_clamped() {
        let mut ip = sample(Condition::First, 0, &[30, 5, 0]);
        let input = sample(Condition::First, 0, &[10, 10, 10]);
        ip.subtract_clamped(&input).unwrap();
        assert_eq!(ip.values(), array![20.0, 0.0, 0.0]);
    }

    #[test]
    fn subtraction_checks_shape() {
        let mut ip = sample(Condition::First, 0, &[30, 5]);
        let input = sample(Condition::First, 0, &[10]);
        assert!(ip.subtract_clamped(&input).is_err());
    }

    #[test]
    fn from_samples_orders_replicates() {
        let matrix = CoverageMatrix::from_samples(vec![
            sample(Condition::Second, 1, &[4, 4]),
            sample(Condition::First, 1, &[2, 2]),
            sample(Condition::Second, 0, &[3, 3]),
            sample(Condition::First, 0, &[1, 1]),
        ])
        .unwrap();
        assert_eq!(matrix.condition(Condition::First), &array![[1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(matrix.condition(Condition::Second), &array![[3.0, 3.0], [4.0, 4.0]]);
        assert_eq!(matrix.sample_ids(), vec![
            SampleId::new(Condition::First, 0),
            SampleId::new(Condition::First, 1),
            SampleId::new(Condition::Second, 0),
            SampleId::new(Condition::Second, 1),
        ]);
    }

    #[test]
    fn from_samples_rejects_gaps_and_bad_shapes() {
        assert!(CoverageMatrix::from_samples(vec![
            sample(Condition::First, 1, &[1]),
            sample(Condition::Second, 0, &[1]),
        ])
        .is_err());
        assert!(CoverageMatrix::from_samples(vec![
            sample(Condition::First, 0, &[1, 2]),
            sample(Condition::Second, 0, &[1]),
        ])
        .is_err());
        assert!(CoverageMatrix::from_samples(vec![sample(Condition::First, 0, &[1])]).is_err());
    }

    #[test]
    fn scaling_and_means() {
        let mut matrix = CoverageMatrix::new(
            array![[1.0, 3.0], [3.0, 5.0]],
            array![[10.0, 0.0]],
        )
        .unwrap();
        assert_eq!(matrix.bin_means(Condition::First), array![2.0, 4.0]);
        assert_eq!(matrix.rounded_means(1), (4, 0));
        assert_eq!(matrix.max_colsum(), 8.0 + 10.0);

        matrix.scale_samples(&[2.0, 1.0, 0.5]).unwrap();
        assert_eq!(matrix.condition(Condition::First), &array![[2.0, 6.0], [3.0, 5.0]]);
        assert_eq!(matrix.condition(Condition::Second), &array![[5.0, 0.0]]);
        assert!(matrix.scale_samples(&[1.0]).is_err());
    }

    #[test]
    fn observations_are_bins_by_samples() {
        let matrix = CoverageMatrix::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            array![[7.0, 8.0, 9.0]],
        )
        .unwrap();
        let obs = matrix.observations(Some(&[0, 2])).unwrap();
        assert_eq!(obs, array![[1.0, 4.0, 7.0], [3.0, 6.0, 9.0]]);
        assert_eq!(matrix.observations(None).unwrap().dim(), (3, 3));
        assert!(matches!(
            matrix.observations(Some(&[1, 3])),
            Err(DiffPeakError::ShapeMismatch(_))
        ));
    }
}
