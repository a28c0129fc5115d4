//! Empirical transfer operator between boxes of a [`BoxPartition`].

use nalgebra::{Complex, DMatrix, DVector};
use pex_core::PexError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::boxes::BoxPartition;
use crate::strategy::sampling_error;

const ROW_EPSILON: f64 = 1e-12;

/// Eigenvalue of the transposed Markov matrix with its right eigenvector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenPair {
    /// Real part of the eigenvalue.
    pub re: f64,
    /// Imaginary part of the eigenvalue.
    pub im: f64,
    /// Modulus of the eigenvalue.
    pub modulus: f64,
    /// Real parts of the unit-norm eigenvector.
    pub vector_re: Vec<f64>,
    /// Imaginary parts of the unit-norm eigenvector.
    pub vector_im: Vec<f64>,
}

/// Serializable summary of a fitted box model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovReport {
    /// Partition the model was fitted on.
    pub partition: BoxPartition,
    /// Raw start-box to end-box counts.
    pub counts: Vec<Vec<u64>>,
    /// Row-normalized transition matrix.
    pub matrix: Vec<Vec<f64>>,
    /// Results whose final state fell outside the domain.
    pub out_of_domain: u64,
    /// Boxes seeding the initial distribution.
    pub initial_boxes: Vec<usize>,
    /// Distribution after 0..=k steps.
    pub propagation: Vec<Vec<f64>>,
    /// Dominant eigenpairs of the transposed matrix.
    pub eigenpairs: Vec<EigenPair>,
    /// `1 / (1 - |λ2|)` when the second eigenvalue lies strictly inside the unit circle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relaxation_time: Option<f64>,
}

/// Transition counts between boxes observed across completed samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovBoxModel {
    partition: BoxPartition,
    counts: DMatrix<u64>,
    out_of_domain: u64,
}

impl MarkovBoxModel {
    /// Starts an empty model over `partition`.
    pub fn new(partition: BoxPartition) -> Self {
        let n = partition.box_count();
        Self {
            partition,
            counts: DMatrix::zeros(n, n),
            out_of_domain: 0,
        }
    }

    /// Partition of the model.
    pub fn partition(&self) -> &BoxPartition {
        &self.partition
    }

    /// Records one observed transition, recomputing the end box from the
    /// final-state coordinates. Returns the end box, or `None` when the
    /// final state left the domain.
    pub fn record(&mut self, start_box: usize, end_coords: &[f64]) -> Result<Option<usize>, PexError> {
        let n = self.partition.box_count();
        if start_box >= n {
            return Err(sampling_error(
                "sampling.box_id",
                format!("start box {start_box} outside partition of {n} boxes"),
            ));
        }
        match self.partition.locate(end_coords) {
            Some(end_box) => {
                self.counts[(start_box, end_box)] += 1;
                Ok(Some(end_box))
            }
            None => {
                warn!(start_box, coords = ?end_coords, "final state outside the box domain");
                self.out_of_domain += 1;
                Ok(None)
            }
        }
    }

    /// Raw count matrix.
    pub fn counts(&self) -> &DMatrix<u64> {
        &self.counts
    }

    /// Row-normalized Markov matrix. Rows without outgoing mass become self-loops.
    pub fn transition_matrix(&self) -> DMatrix<f64> {
        let n = self.partition.box_count();
        let mut matrix = DMatrix::<f64>::zeros(n, n);
        for row in 0..n {
            let total: u64 = self.counts.row(row).iter().sum();
            if total == 0 {
                matrix[(row, row)] = 1.0;
                continue;
            }
            for col in 0..n {
                matrix[(row, col)] = self.counts[(row, col)] as f64 / total as f64;
            }
        }
        matrix
    }

    /// Propagates the uniform distribution over `initial_boxes` forward
    /// `steps` times, returning the distribution after each step (step 0 first).
    pub fn propagate(&self, initial_boxes: &[usize], steps: usize) -> Result<Vec<Vec<f64>>, PexError> {
        let n = self.partition.box_count();
        if initial_boxes.is_empty() {
            return Err(sampling_error(
                "sampling.initial_boxes",
                "initial distribution needs at least one box",
            ));
        }
        let mut state = DVector::<f64>::zeros(n);
        for &box_id in initial_boxes {
            if box_id >= n {
                return Err(sampling_error(
                    "sampling.box_id",
                    format!("initial box {box_id} outside partition of {n} boxes"),
                ));
            }
            state[box_id] = 1.0;
        }
        let mass = state.sum();
        state /= mass;

        let transposed = self.transition_matrix().transpose();
        let mut history = Vec::with_capacity(steps + 1);
        history.push(state.iter().copied().collect());
        for _ in 0..steps {
            state = &transposed * &state;
            history.push(state.iter().copied().collect());
        }
        Ok(history)
    }

    /// Eigenpairs of the transposed Markov matrix, sorted by descending
    /// eigenvalue modulus, truncated to `count`.
    pub fn dominant_eigenpairs(&self, count: usize) -> Vec<EigenPair> {
        let transposed = self.transition_matrix().transpose();
        let n = transposed.nrows();
        if n == 0 || count == 0 {
            return Vec::new();
        }
        let mut eigenvalues: Vec<Complex<f64>> =
            transposed.complex_eigenvalues().iter().copied().collect();
        eigenvalues.sort_by(|a, b| {
            modulus(*b)
                .partial_cmp(&modulus(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.re.partial_cmp(&a.re).unwrap_or(std::cmp::Ordering::Equal))
                .then(b.im.partial_cmp(&a.im).unwrap_or(std::cmp::Ordering::Equal))
        });
        eigenvalues.truncate(count.min(n));

        let complex = transposed.map(|value| Complex::new(value, 0.0));
        eigenvalues
            .into_iter()
            .map(|lambda| {
                let shifted = &complex - DMatrix::from_diagonal_element(n, n, lambda);
                let vector = null_vector(shifted);
                EigenPair {
                    re: round(lambda.re),
                    im: round(lambda.im),
                    modulus: round(modulus(lambda)),
                    vector_re: vector.iter().map(|c| round(c.re)).collect(),
                    vector_im: vector.iter().map(|c| round(c.im)).collect(),
                }
            })
            .collect()
    }

    /// Relaxation time estimate from the second largest eigenvalue modulus.
    pub fn relaxation_time(eigenpairs: &[EigenPair]) -> Option<f64> {
        let second = eigenpairs.get(1)?.modulus;
        (second < 1.0 - ROW_EPSILON).then(|| 1.0 / (1.0 - second))
    }

    /// Builds the serializable report.
    pub fn report(
        &self,
        initial_boxes: &[usize],
        steps: usize,
        eigenpairs: usize,
    ) -> Result<MarkovReport, PexError> {
        let propagation = self.propagate(initial_boxes, steps)?;
        let pairs = self.dominant_eigenpairs(eigenpairs);
        let matrix = self.transition_matrix();
        let n = matrix.nrows();
        Ok(MarkovReport {
            partition: self.partition.clone(),
            counts: (0..n)
                .map(|row| self.counts.row(row).iter().copied().collect())
                .collect(),
            matrix: (0..n)
                .map(|row| matrix.row(row).iter().copied().collect())
                .collect(),
            out_of_domain: self.out_of_domain,
            initial_boxes: initial_boxes.to_vec(),
            propagation,
            relaxation_time: Self::relaxation_time(&pairs),
            eigenpairs: pairs,
        })
    }
}

/// Right singular vector of the smallest singular value, normalized and
/// phase-aligned so its largest component is real and positive.
fn null_vector(matrix: DMatrix<Complex<f64>>) -> Vec<Complex<f64>> {
    let n = matrix.ncols();
    let svd = matrix.svd(false, true);
    let Some(v_t) = svd.v_t else {
        return vec![Complex::new(0.0, 0.0); n];
    };
    let (row, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (idx, &value)| {
            if value < best.1 {
                (idx, value)
            } else {
                best
            }
        });
    let mut vector: Vec<Complex<f64>> = v_t.row(row).iter().map(|c| c.conj()).collect();
    let norm = vector.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        let pivot = vector
            .iter()
            .copied()
            .fold(Complex::new(0.0, 0.0), |best, c| if modulus(c) > modulus(best) { c } else { best });
        let phase = pivot.conj() / modulus(pivot);
        for component in &mut vector {
            *component = *component * phase / norm;
        }
    }
    vector
}

fn modulus(value: Complex<f64>) -> f64 {
    value.norm_sqr().sqrt()
}

fn round(value: f64) -> f64 {
    let scaled = (value * 1e9).round();
    scaled / 1e9
}
