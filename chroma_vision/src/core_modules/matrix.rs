//! Row-major 2-D `f64` matrix shared by the hue matrix and its compressed form.
//!
//! Serializes transparently as an array of arrays, which is the exact shape of
//! the hue-matrix export document.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix {
    cells: Vec<Vec<f64>>,
}

/// Hue values in [0, 1); row = image row, column = image column.
pub type HueMatrix = Matrix;

/// A block-averaged matrix with fixed target dimensions.
pub type CompressedMatrix = Matrix;

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![vec![0.0; cols]; rows],
        }
    }

    /// Wraps nested rows, rejecting ragged input.
    pub fn from_rows(cells: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(first) = cells.first() {
            let cols = first.len();
            if let Some((index, row)) = cells.iter().enumerate().find(|(_, r)| r.len() != cols) {
                return Err(VisionError::InvalidDimensions(format!(
                    "row {index} has {} columns, expected {cols}",
                    row.len()
                )));
            }
        }
        Ok(Self { cells })
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.cells[row][col] = value;
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().flatten().copied()
    }

    pub fn as_rows(&self) -> &[Vec<f64>] {
        &self.cells
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.dimensions(), (2, 2));
        assert_eq!(m.get(1, 0), Some(3.0));
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.25]]).unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "[[0.5,0.25]]");
    }
}
