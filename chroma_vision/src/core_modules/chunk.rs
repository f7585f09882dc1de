// THEORY:
// A `Chunk` is a rectangular block of matrix cells: the unit of spatial pooling
// used by the matrix compressor. Like `Pixel`, it is a "dumb" data container that
// only knows how to summarize its own values; it does not know where it sits in
// the grid or how its neighbors were cut.

pub mod chunk {
    use crate::core_modules::matrix::Matrix;
    use std::ops::Range;

    /// A rectangular block of values cut from a larger matrix.
    pub struct Chunk {
        /// Number of source rows that contributed.
        pub height: usize,
        /// Number of source columns that contributed.
        pub width: usize,
        /// The block's cells, flattened row by row.
        pub values: Vec<f64>,
    }

    impl Chunk {
        pub fn new(width: usize, height: usize, values: Vec<f64>) -> Self {
            Self {
                height,
                width,
                values,
            }
        }

        /// Copies the cells of `source` inside `rows x cols`. Ranges are clamped
        /// to the source, so a block past the edge is simply empty.
        pub fn cut(source: &Matrix, rows: Range<usize>, cols: Range<usize>) -> Self {
            let row_end = rows.end.min(source.rows());
            let col_end = cols.end.min(source.cols());
            let row_range = rows.start.min(row_end)..row_end;
            let col_range = cols.start.min(col_end)..col_end;

            let mut values = Vec::with_capacity(row_range.len() * col_range.len());
            for row in &source.as_rows()[row_range.clone()] {
                values.extend_from_slice(&row[col_range.clone()]);
            }
            Self::new(col_range.len(), row_range.len(), values)
        }

        /// Arithmetic mean of the block; an empty block averages to 0.
        pub fn average(&self) -> f64 {
            if self.values.is_empty() {
                return 0.0;
            }
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }
}
