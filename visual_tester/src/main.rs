use anyhow::{Context, bail};
use flexi_logger::Logger;
use image::{Rgb, RgbImage};
use inrange_vision::config::{InRangeParams, load_pipeline_config, parse_pipeline_config};
use inrange_vision::core_modules::utils::image_helper::image_helper::{save_mask, save_rgb};
use inrange_vision::parallel_pipeline::ParallelDetector;
use inrange_vision::pipeline::PostProcessingPipeline;
use inrange_vision::registry::StageRegistry;
use inrange_vision::stage::InRangeStage;
use inrange_vision::{ColorDetector, FrameGeometry, OwnedFrame, YuvMatrix};
use log::info;
use std::env;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

const DEFAULT_PIPELINE: &str = r#"{ "inrange": { "debug_mask": true } }"#;
const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;
const SYNTHETIC_FRAMES: u32 = 30;

enum Source {
    RawFile { path: PathBuf, geometry: FrameGeometry },
    Synthetic,
}

fn usage() {
    println!("Usage: visual_tester [--parallel] <input.yuv> <width> <height> <output_dir> [pipeline.json]");
    println!("       visual_tester [--parallel] --synthetic <output_dir> [pipeline.json]");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    // --- 1. Argument Parsing & Setup ---
    let mut args: Vec<String> = env::args().collect();
    let parallel = match args.iter().position(|arg| arg == "--parallel") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    let (source, output_dir, pipeline_path) = match args.get(1).map(String::as_str) {
        Some("--synthetic") if args.len() >= 3 => (Source::Synthetic, PathBuf::from(&args[2]), args.get(3)),
        Some(_) if args.len() >= 5 => {
            let width: u32 = args[2].parse().context("width must be a positive integer")?;
            let height: u32 = args[3].parse().context("height must be a positive integer")?;
            let geometry = FrameGeometry::packed(width, height)?;
            let source = Source::RawFile {
                path: PathBuf::from(&args[1]),
                geometry,
            };
            (source, PathBuf::from(&args[4]), args.get(5))
        }
        _ => {
            usage();
            return Ok(());
        }
    };
    fs::create_dir_all(&output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    if parallel {
        return run_parallel(source, &output_dir, pipeline_path.map(String::as_str)).await;
    }

    // --- 2. Pipeline Initialization ---
    let registry = StageRegistry::with_builtin_stages();
    let pipeline = match pipeline_path {
        Some(path) => PostProcessingPipeline::from_file(&registry, path).with_context(|| format!("loading {path}"))?,
        None => PostProcessingPipeline::from_json(&registry, DEFAULT_PIPELINE)?,
    };
    info!("pipeline stages: {:?}", pipeline.stage_names());

    // --- 3. Main Processing Loop ---
    let mut processed = 0u32;
    let mut detected = 0u32;
    let mut handle = |index: u32, mut frame: OwnedFrame| -> anyhow::Result<()> {
        let report = pipeline.process_frame(&mut frame.as_frame_mut());
        match report.detection() {
            Some(bbox) => {
                detected += 1;
                info!("frame {index}: {bbox:?}");
            }
            None => info!("frame {index}: no detection"),
        }

        // --- 4. Visualization ---
        let annotated = frame.as_frame().to_rgb(YuvMatrix::Jpeg);
        save_rgb(output_dir.join(format!("frame_{index:05}.png")), &annotated)?;
        for (stage, output) in &report.stage_outputs {
            if let Some(mask) = &output.debug_mask {
                save_mask(output_dir.join(format!("frame_{index:05}_{stage}_mask.png")), mask)?;
            }
        }
        processed += 1;
        Ok(())
    };

    match source {
        Source::RawFile { path, geometry } => {
            let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            let mut index = 0;
            while let Some(data) = read_frame(&mut file, geometry.buffer_len())? {
                handle(index, OwnedFrame::new(geometry, data)?)?;
                index += 1;
            }
        }
        Source::Synthetic => {
            for index in 0..SYNTHETIC_FRAMES {
                handle(index, synthetic_frame(index)?)?;
            }
        }
    }

    info!(
        "{} frame(s) processed, {} with a detection, written to {}",
        processed,
        detected,
        output_dir.display()
    );
    Ok(())
}

/// Detection only, on the worker pool: masks are written, frames are not annotated.
async fn run_parallel(source: Source, output_dir: &Path, pipeline_path: Option<&str>) -> anyhow::Result<()> {
    // --- 2. Detector Initialization ---
    let sections = match pipeline_path {
        Some(path) => load_pipeline_config(path).with_context(|| format!("loading {path}"))?,
        None => parse_pipeline_config(DEFAULT_PIPELINE)?,
    };
    let params = match sections.get(InRangeStage::NAME) {
        Some(section) => InRangeParams::from_value(section)?,
        None => InRangeParams::default(),
    };
    let detector = ParallelDetector::new(ColorDetector::new(params.target(), params.yuv_matrix), params.debug_mask);
    info!("parallel detector with {} worker(s)", detector.worker_count());

    // --- 3. Batch Processing ---
    let frames: Vec<OwnedFrame> = match source {
        Source::RawFile { path, geometry } => {
            let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            let mut frames = Vec::new();
            while let Some(data) = read_frame(&mut file, geometry.buffer_len())? {
                frames.push(OwnedFrame::new(geometry, data)?);
            }
            frames
        }
        Source::Synthetic => (0..SYNTHETIC_FRAMES).map(synthetic_frame).collect::<anyhow::Result<_>>()?,
    };
    let Some(geometry) = frames.first().map(|frame| frame.geometry) else {
        info!("no frames to process");
        return Ok(());
    };
    let views: Vec<&[u8]> = frames.iter().map(|frame| frame.data.as_slice()).collect();

    let mut detected = 0u32;
    for result in detector.process_batch(&views, geometry).await {
        let result = result?;
        match result.detection {
            Some(bbox) => {
                detected += 1;
                info!("frame {}: {:?}", result.frame_id, bbox);
            }
            None => info!("frame {}: no detection", result.frame_id),
        }
        if let Some(mask) = &result.debug_mask {
            save_mask(output_dir.join(format!("frame_{:05}_mask.png", result.frame_id)), mask)?;
        }
    }
    detector.shutdown().await;

    info!("{} frame(s) processed in parallel, {} with a detection", frames.len(), detected);
    Ok(())
}

/// Reads one whole frame, or `None` at end of file. A trailing partial frame is an error.
fn read_frame(file: &mut File, frame_len: usize) -> anyhow::Result<Option<Vec<u8>>> {
    let mut data = vec![0u8; frame_len];
    let mut filled = 0;
    while filled < frame_len {
        match file.read(&mut data[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(None),
        n if n == frame_len => Ok(Some(data)),
        n => bail!("input ends with a partial frame ({n} of {frame_len} bytes)"),
    }
}

/// A red square sliding across a grey background, with a smaller red decoy.
fn synthetic_frame(index: u32) -> anyhow::Result<OwnedFrame> {
    let mut rgb = RgbImage::from_pixel(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, Rgb([128, 128, 128]));
    let left = (index * 8) % (SYNTHETIC_WIDTH - 60);
    fill(&mut rgb, left, 80, 60, 60, Rgb([255, 0, 0]));
    fill(&mut rgb, 260, 20, 20, 20, Rgb([230, 20, 20]));
    Ok(OwnedFrame::from_rgb(&rgb, SYNTHETIC_WIDTH)?)
}

fn fill(rgb: &mut RgbImage, left: u32, top: u32, width: u32, height: u32, color: Rgb<u8>) {
    for y in top..(top + height).min(rgb.height()) {
        for x in left..(left + width).min(rgb.width()) {
            rgb.put_pixel(x, y, color);
        }
    }
}
