use anyhow::{Context, bail};
use chroma_vision::core_modules::color_space::hsb_to_rgb;
use chroma_vision::core_modules::export::write_document;
use chroma_vision::pipeline::CompressedMatrix;
use chroma_vision::{AnalysisPipeline, PipelineConfig};
use image::ImageEncoder;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

/// Side length, in output pixels, of one compressed hue cell.
const CELL_SIZE: u32 = 40;

/// Paints each compressed cell as a fully saturated, fully bright swatch.
fn render_hue_grid(grid: &CompressedMatrix) -> (u32, u32, Vec<u8>) {
    let width = grid.cols() as u32 * CELL_SIZE;
    let height = grid.rows() as u32 * CELL_SIZE;
    let mut buffer = vec![0u8; (width * height * 4) as usize];

    for (i, rgba) in buffer.chunks_mut(4).enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        let hue = grid
            .get((y / CELL_SIZE) as usize, (x / CELL_SIZE) as usize)
            .unwrap_or(0.0);
        let (r, g, b) = hsb_to_rgb(hue, 1.0, 1.0);
        rgba[0] = (r * 255.0).round() as u8;
        rgba[1] = (g * 255.0).round() as u8;
        rgba[2] = (b * 255.0).round() as u8;
        rgba[3] = 255;
    }
    (width, height, buffer)
}

fn save_png(path: &Path, width: u32, height: u32, buffer: &[u8]) -> anyhow::Result<()> {
    let output = fs::File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: visual_tester <input_image_path> <output_dir> [config.json]");
        return Ok(());
    }
    let input_path = Path::new(&args[1]);
    let output_dir = Path::new(&args[2]);
    let config = match args.get(3) {
        Some(path) => PipelineConfig::from_json_file(Path::new(path))?,
        None => PipelineConfig::default(),
    };
    if !output_dir.is_dir() {
        bail!("output directory {} does not exist", output_dir.display());
    }

    // --- 2. Analysis ---
    let bytes = fs::read(input_path)
        .with_context(|| format!("cannot read {}", input_path.display()))?;
    let metadata = format!("Source: {}", input_path.display());
    let pipeline = AnalysisPipeline::new(config)?;
    let result = pipeline.analyze_bytes(&bytes, Some(metadata))?;
    result.check()?;

    // --- 3. Report ---
    let stat = result.aggregate.chromaticity;
    println!(
        "Chromaticity x = {:.4} (σ {:.4}), y = {:.4} (σ {:.4}) over {} of {} pixels",
        stat.mean.x,
        stat.std_dev.x,
        stat.mean.y,
        stat.std_dev.y,
        result.aggregate.valid_pixel_count,
        result.aggregate.pixel_count,
    );
    if let Some(rgb) = result.rgb {
        println!("RGB value: ({}, {}, {})", rgb.r, rgb.g, rgb.b);
    }
    println!("Dominant hues: {:?}", result.dominant_hues());

    // --- 4. Visualization & Export ---
    let (width, height, buffer) = render_hue_grid(&result.compressed);
    let grid_path = output_dir.join("hue_grid.png");
    save_png(&grid_path, width, height, &buffer)?;
    info!(path = %grid_path.display(), "saved hue grid");

    for document in [
        result.hue_matrix_document(),
        result.aggregate_document(pipeline.config()),
    ] {
        write_document(&output_dir.join(document.file_name()), &document.encode()?)?;
    }

    println!("Wrote results to {}", output_dir.display());
    Ok(())
}
