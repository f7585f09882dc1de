// 1-dimensional (single pixel) heuristics live under `D1`.
#[allow(non_snake_case)]
pub mod D1 {
    pub mod pixel;
}

pub mod chunk;
pub mod color_space;
pub mod export;
pub mod hue_matrix;
pub mod matrix;
pub mod matrix_compressor;
pub mod pixel_sampler;
pub mod statistics;
