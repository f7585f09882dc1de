// THEORY:
// The matrix compressor reduces an arbitrary-size matrix to a fixed display grid
// by block averaging: it slices the matrix into `Chunk`s once and keeps only each
// chunk's average.
//
// Block size per axis is `max(1, source / target)`. Blocks start at
// `i * block` and stop at `min((i + 1) * block, source)`, so when the source does
// not divide evenly the trailing rows/columns past `target * block` are not
// visited, and when the target exceeds the source the trailing cells receive no
// source cells and stay 0. Output is always exactly `target_rows x target_cols`.

use crate::core_modules::chunk::chunk::Chunk;
use crate::core_modules::matrix::{CompressedMatrix, Matrix};
use crate::error::{Result, VisionError};

pub fn compress_matrix(
    source: &Matrix,
    target_rows: usize,
    target_cols: usize,
) -> Result<CompressedMatrix> {
    if target_rows == 0 || target_cols == 0 {
        return Err(VisionError::InvalidDimensions(format!(
            "compression target {target_rows}x{target_cols} must be at least 1x1"
        )));
    }

    let (rows, cols) = source.dimensions();
    let row_block = (rows / target_rows).max(1);
    let col_block = (cols / target_cols).max(1);

    let mut compressed = Matrix::zeros(target_rows, target_cols);
    for i in 0..target_rows {
        for j in 0..target_cols {
            let chunk = Chunk::cut(
                source,
                i * row_block..(i + 1) * row_block,
                j * col_block..(j + 1) * col_block,
            );
            compressed.set(i, j, chunk.average());
        }
    }
    Ok(compressed)
}
