use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::config::PreprocessPolicy;
use crate::error::ProcessError;

/// Binomial approximation of a 5-tap Gaussian, sums to 16.
const GAUSSIAN_5: [u32; 5] = [1, 4, 6, 4, 1];
const CONTRAST_ALPHA: f32 = 1.5;
const UPSAMPLE_FACTOR: f32 = 1.5;
const THRESHOLD_BLOCK: u32 = 15;
const THRESHOLD_C: f64 = 10.0;

/// Normalizes an uploaded photo into a PNG that OCR reads reliably.
///
/// Synchronous and CPU-bound; async callers go through `spawn_blocking`.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    policy: PreprocessPolicy,
}

impl ImagePreprocessor {
    pub fn new(policy: PreprocessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PreprocessPolicy {
        self.policy
    }

    pub fn process(&self, data: &[u8]) -> Result<Vec<u8>, ProcessError> {
        let _span = tracing::info_span!("processor.preprocess", policy = ?self.policy).entered();

        if data.is_empty() {
            return Err(ProcessError::EmptyInput);
        }

        let img = image::load_from_memory(data)
            .map_err(|e| ProcessError::Decode(e.to_string()))?;
        let gray = img.to_luma8();

        let output = match self.policy {
            PreprocessPolicy::SmoothContrast => contrast_stretch(&gaussian_blur_5x5(&gray)),
            PreprocessPolicy::UpsampleThreshold => adaptive_mean_threshold(
                &upsample(&gray, UPSAMPLE_FACTOR),
                THRESHOLD_BLOCK,
                THRESHOLD_C,
            ),
        };

        log::debug!(
            "Preprocessed {}x{} image to {}x{}",
            gray.width(),
            gray.height(),
            output.width(),
            output.height()
        );

        encode_png(output)
    }
}

/// Mirror index without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(index: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as u32;
        }
    }
}

fn gaussian_blur_5x5(src: &GrayImage) -> GrayImage {
    let (width, height) = src.dimensions();

    // Horizontal pass keeps the unnormalized sums (max 255 * 16).
    let mut horizontal = vec![0u32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0u32;
            for (k, weight) in GAUSSIAN_5.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - 2, width);
                acc += weight * src.get_pixel(sx, y)[0] as u32;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0u32;
        for (k, weight) in GAUSSIAN_5.iter().enumerate() {
            let sy = reflect_101(y as i64 + k as i64 - 2, height);
            acc += weight * horizontal[(sy * width + x) as usize];
        }
        Luma([((acc + 128) >> 8).min(255) as u8])
    })
}

/// `saturate(|alpha * v|)`, rounded.
fn contrast_stretch(src: &GrayImage) -> GrayImage {
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        let scaled = (CONTRAST_ALPHA * pixel[0] as f32).abs().round();
        pixel[0] = scaled.min(255.0) as u8;
    }
    out
}

fn upsample(src: &GrayImage, factor: f32) -> GrayImage {
    let width = ((src.width() as f32 * factor).round() as u32).max(1);
    let height = ((src.height() as f32 * factor).round() as u32).max(1);
    image::imageops::resize(src, width, height, FilterType::Triangle)
}

/// Binary threshold against the local mean minus `c`. Border pixels are
/// replicated to fill the window, and the mean is rounded to 8 bits before
/// the comparison.
fn adaptive_mean_threshold(src: &GrayImage, block: u32, c: f64) -> GrayImage {
    let (width, height) = src.dimensions();
    let radius = block / 2;
    let padded_w = width + 2 * radius;
    let padded_h = height + 2 * radius;
    let stride = (padded_w + 1) as usize;

    let replicated = |px: u32, py: u32| {
        let x = px.saturating_sub(radius).min(width - 1);
        let y = py.saturating_sub(radius).min(height - 1);
        src.get_pixel(x, y)[0] as u64
    };

    // Summed-area table over the padded image, with a zero row and column in front.
    let mut integral = vec![0u64; stride * (padded_h + 1) as usize];
    for py in 0..padded_h {
        let mut row_sum = 0u64;
        for px in 0..padded_w {
            row_sum += replicated(px, py);
            let idx = (py as usize + 1) * stride + px as usize + 1;
            integral[idx] = integral[idx - stride] + row_sum;
        }
    }

    let window = (block * block) as f64;
    GrayImage::from_fn(width, height, |x, y| {
        // Window in padded coordinates is [x, x + block) by [y, y + block).
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + block as usize, y0 + block as usize);
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let mean = (sum as f64 / window).round();
        if src.get_pixel(x, y)[0] as f64 > mean - c {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn encode_png(img: GrayImage) -> Result<Vec<u8>, ProcessError> {
    let mut png_data = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png)
        .map_err(|e| ProcessError::Encode(e.to_string()))?;
    Ok(png_data)
}
