//! Axis-aligned box partition of a bounded parameter domain.

use indexmap::IndexMap;
use pex_core::{PexError, RngHandle};
use pex_doc::Node;
use serde::{Deserialize, Serialize};

use crate::point::ParameterPoint;
use crate::strategy::{ensure_distinct_addresses, sampling_error, SamplingStrategy, WithAddress};

/// Maximum number of axes supported by the partition.
pub const MAX_AXES: usize = 3;

/// One axis of a box/Ulam domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxAxis {
    /// Document address of the varied leaf.
    pub address: String,
    /// Lower bound of the domain.
    pub lower: f64,
    /// Upper bound of the domain.
    pub upper: f64,
    /// Number of equal-width boxes.
    pub boxes: usize,
    /// Interior sample points per box.
    pub test_functions: usize,
}

impl BoxAxis {
    /// Width of a single box along this axis.
    pub fn box_width(&self) -> f64 {
        (self.upper - self.lower) / self.boxes as f64
    }

    /// Index of the box containing `value`, or `None` outside `[lower, upper]`.
    ///
    /// The upper bound belongs to the last box, so every point of the closed
    /// domain lands in exactly one box.
    pub fn box_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.lower || value > self.upper {
            return None;
        }
        let raw = ((value - self.lower) / self.box_width()).floor();
        Some((raw as usize).min(self.boxes - 1))
    }

    /// Interior points of box `index`, endpoints excluded.
    pub fn interior_points(&self, index: usize) -> Vec<f64> {
        let width = self.box_width();
        let start = self.lower + index as f64 * width;
        let step = width / (self.test_functions + 1) as f64;
        (1..=self.test_functions)
            .map(|k| start + k as f64 * step)
            .collect()
    }

    fn validate(&self) -> Result<(), PexError> {
        if !(self.lower.is_finite() && self.upper.is_finite() && self.lower < self.upper) {
            return Err(sampling_error(
                "sampling.box_bounds",
                format!("axis bounds must satisfy lower < upper, got [{}, {}]", self.lower, self.upper),
            )
            .with_address(&self.address));
        }
        if self.boxes == 0 || self.test_functions == 0 {
            return Err(sampling_error(
                "sampling.box_counts",
                "box and test function counts must be positive",
            )
            .with_address(&self.address));
        }
        Ok(())
    }
}

/// Row-major partition of a 1–3 dimensional domain into boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPartition {
    axes: Vec<BoxAxis>,
}

impl BoxPartition {
    /// Validates the axes and builds the partition.
    pub fn new(axes: Vec<BoxAxis>) -> Result<Self, PexError> {
        if axes.is_empty() || axes.len() > MAX_AXES {
            return Err(sampling_error(
                "sampling.box_axes",
                format!("box/Ulam sampling needs 1 to {MAX_AXES} axes, got {}", axes.len()),
            ));
        }
        ensure_distinct_addresses(axes.iter().map(|axis| axis.address.as_str()))?;
        for axis in &axes {
            axis.validate()?;
        }
        Ok(Self { axes })
    }

    /// Axes in row-major order (first axis varies slowest).
    pub fn axes(&self) -> &[BoxAxis] {
        &self.axes
    }

    /// Total number of boxes.
    pub fn box_count(&self) -> usize {
        self.axes.iter().map(|axis| axis.boxes).product()
    }

    /// Combines per-axis indices into a row-major box id.
    pub fn box_id(&self, indices: &[usize]) -> usize {
        self.axes
            .iter()
            .zip(indices)
            .fold(0, |acc, (axis, &index)| acc * axis.boxes + index)
    }

    /// Splits a box id back into per-axis indices.
    pub fn box_indices(&self, mut box_id: usize) -> Vec<usize> {
        let mut indices = vec![0; self.axes.len()];
        for (slot, axis) in indices.iter_mut().zip(&self.axes).rev() {
            *slot = box_id % axis.boxes;
            box_id /= axis.boxes;
        }
        indices
    }

    /// Box containing `coords`, or `None` when outside the domain or the
    /// dimension does not match.
    pub fn locate(&self, coords: &[f64]) -> Option<usize> {
        if coords.len() != self.axes.len() {
            return None;
        }
        let indices = self
            .axes
            .iter()
            .zip(coords)
            .map(|(axis, &value)| axis.box_index(value))
            .collect::<Option<Vec<_>>>()?;
        Some(self.box_id(&indices))
    }

    /// Lower and upper corner of a box.
    pub fn bounds(&self, box_id: usize) -> Vec<(f64, f64)> {
        self.box_indices(box_id)
            .into_iter()
            .zip(&self.axes)
            .map(|(index, axis)| {
                let lower = axis.lower + index as f64 * axis.box_width();
                (lower, lower + axis.box_width())
            })
            .collect()
    }
}

/// Box/Ulam discretization: every box contributes its interior test points,
/// cross-producted over all axes and tagged with the originating box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxUlam {
    partition: BoxPartition,
}

impl BoxUlam {
    /// Builds the strategy after validating the axes.
    pub fn new(axes: Vec<BoxAxis>) -> Result<Self, PexError> {
        Ok(Self {
            partition: BoxPartition::new(axes)?,
        })
    }

    /// Underlying partition.
    pub fn partition(&self) -> &BoxPartition {
        &self.partition
    }
}

impl SamplingStrategy for BoxUlam {
    fn points(&self, _rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError> {
        let per_axis: Vec<Vec<f64>> = self
            .partition
            .axes()
            .iter()
            .map(|axis| (0..axis.boxes).flat_map(|i| axis.interior_points(i)).collect())
            .collect();

        let mut coords: Vec<Vec<f64>> = vec![Vec::new()];
        for values in &per_axis {
            coords = coords
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |&value| {
                        let mut next = prefix.clone();
                        next.push(value);
                        next
                    })
                })
                .collect();
        }

        coords
            .into_iter()
            .enumerate()
            .map(|(parameter_id, point)| {
                let box_id = self.partition.locate(&point).ok_or_else(|| {
                    sampling_error("sampling.box_locate", "interior point fell outside the domain")
                })?;
                let values: IndexMap<String, Node> = self
                    .partition
                    .axes()
                    .iter()
                    .zip(&point)
                    .map(|(axis, &value)| (axis.address.clone(), Node::Float(value)))
                    .collect();
                Ok(ParameterPoint {
                    box_id: Some(box_id),
                    ..ParameterPoint::new(parameter_id, values)
                })
            })
            .collect()
    }
}
