//! textel - Render an image as colored terminal text
//!
//! Fetches or opens an image, sizes it to the output box, and prints it
//! using ANSI, xterm-256 or mIRC color codes.

use clap::{Parser, ValueEnum};
use image::imageops::{self, ColorMap, FilterType};
use image::RgbImage;
use std::error::Error;
use std::io::{self, Write};
use textel::{fit_dimensions, render_lines, Palette, RenderOptions};

#[derive(Parser)]
#[command(name = "textel")]
#[command(version)]
#[command(about = "Render an image as colored terminal text", long_about = None)]
struct Cli {
    /// Image source: local path or http(s) URL
    source: String,

    /// Half-block output: twice the vertical resolution, half the colors
    #[arg(long)]
    hires: bool,

    /// Emit mIRC color codes instead of ANSI escapes
    #[arg(short, long)]
    irc: bool,

    /// Use the xterm 256-color palette
    #[arg(short, long)]
    xterm: bool,

    /// Restrict the xterm palette to its grayscale ramp
    #[arg(long, requires = "xterm")]
    grayscale: bool,

    /// Vertical sampling stride in image rows
    #[arg(short, long, default_value = "2")]
    step: usize,

    /// Contrast multiplier applied before sampling (1.0 = unchanged)
    #[arg(short, long, default_value = "1.0")]
    contrast: f32,

    /// Skip near-black palette matches below this distance
    #[arg(short, long, default_value = "0.0")]
    black: f64,

    /// Skip near-white palette matches below this distance
    #[arg(short = 'w', long, default_value = "0.0")]
    white: f64,

    /// Output box width in cells
    #[arg(long, default_value = "120")]
    max_width: u32,

    /// Output box height in image rows
    #[arg(long, default_value = "100")]
    max_height: u32,

    /// Resize interpolation
    #[arg(long, value_enum, default_value = "antialias")]
    filter: Filter,

    /// Error-diffuse onto the output palette before sampling
    #[arg(long)]
    dither: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    Antialias,
    Nearest,
    Bicubic,
    Bilinear,
}

impl Filter {
    fn to_image(self) -> FilterType {
        match self {
            Filter::Antialias => FilterType::Lanczos3,
            Filter::Nearest => FilterType::Nearest,
            Filter::Bicubic => FilterType::CatmullRom,
            Filter::Bilinear => FilterType::Triangle,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let img = acquire(&cli.source)?;
    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_dimensions(width, height, cli.max_width, cli.max_height);
    let mut rgb = imageops::resize(&img, new_width, new_height, cli.filter.to_image());

    if (cli.contrast - 1.0).abs() > f32::EPSILON {
        apply_contrast(&mut rgb, cli.contrast);
    }

    let opts = RenderOptions {
        irc: cli.irc,
        xterm: cli.xterm,
        high_res: cli.hires,
        grayscale: cli.grayscale,
        step: cli.step,
        black_threshold: cli.black,
        white_threshold: cli.white,
    };

    if cli.dither {
        imageops::dither(&mut rgb, &PaletteMap(Palette::resolve(&opts)));
    }

    eprintln!(
        "Rendering '{}' ({}x{} -> {}x{})",
        cli.source, width, height, new_width, new_height
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let lines = render_lines(rgb.as_raw(), new_width as usize, new_height as usize, &opts)?;
    for line in lines {
        out.write_all(line.as_bytes())?;
    }

    Ok(())
}

/// Loads the source image from a local path or over HTTP.
///
/// All failures here are fatal and single-shot: no retries.
fn acquire(source: &str) -> Result<RgbImage, Box<dyn Error>> {
    let img = if source.starts_with("http://") || source.starts_with("https://") {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("textel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let bytes = client
            .get(source)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| format!("Failed to fetch '{}': {}", source, e))?
            .bytes()
            .map_err(|e| format!("Failed to fetch '{}': {}", source, e))?;
        image::load_from_memory(&bytes)
            .map_err(|e| format!("Failed to decode '{}': {}", source, e))?
    } else {
        image::open(source).map_err(|e| format!("Failed to open '{}': {}", source, e))?
    };
    Ok(img.to_rgb8())
}

/// Scales contrast around the image's mean luminance:
/// `out = mean + (in - mean) * factor`.
fn apply_contrast(img: &mut RgbImage, factor: f32) {
    let mut total = 0.0f64;
    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        total += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    }
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let mean = (total / count as f64) as f32;

    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let scaled = mean + (*channel as f32 - mean) * factor;
            *channel = scaled.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Adapts the fixed output palette to `image`'s error-diffusion
/// dithering.
struct PaletteMap(Palette);

impl ColorMap for PaletteMap {
    type Color = image::Rgb<u8>;

    fn index_of(&self, color: &Self::Color) -> usize {
        self.0.nearest(color.0)
    }

    fn map_color(&self, color: &mut Self::Color) {
        *color = image::Rgb(self.0.entries()[self.index_of(color)].rgb);
    }
}
