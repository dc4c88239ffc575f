use anyhow::{anyhow, Result};
use image::{GrayImage, Rgb, RgbImage};

use crate::filter::library::{Corner, FilterLibrary};

/// FAST-9 intensity threshold used to collect corner candidates.
const FAST_THRESHOLD: u8 = 20;

/// FAST needs a 3-pixel ring around each candidate.
const FAST_MIN_SIDE: u32 = 7;

/// CPU filter library backed by `imageproc`.
#[derive(Default)]
pub struct CpuLibrary;

impl CpuLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl FilterLibrary for CpuLibrary {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn box_blur(&mut self, plane: &GrayImage, kernel_size: u32) -> Result<GrayImage> {
        if kernel_size == 0 {
            return Err(anyhow!("blur kernel size must be >= 1"));
        }
        // Even sizes round up to the next odd window.
        let radius = kernel_size / 2;
        Ok(imageproc::filter::box_filter(plane, radius, radius))
    }

    fn corner_responses(&mut self, gray: &GrayImage, block_size: u32) -> Result<Vec<Corner>> {
        let (width, height) = gray.dimensions();
        if width < FAST_MIN_SIDE || height < FAST_MIN_SIDE {
            return Ok(Vec::new());
        }
        let candidates: Vec<Corner> = imageproc::corners::corners_fast9(gray, FAST_THRESHOLD)
            .into_iter()
            .map(|c| Corner {
                x: c.x,
                y: c.y,
                score: c.score,
            })
            .collect();
        Ok(local_maxima(candidates, width, height, block_size))
    }

    fn canny(&mut self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage> {
        if !(low >= 0.0 && low <= high) {
            return Err(anyhow!(
                "canny thresholds must satisfy 0 <= low <= high (got {}, {})",
                low,
                high
            ));
        }
        Ok(imageproc::edges::canny(gray, low, high))
    }

    fn draw_hollow_circle(
        &mut self,
        canvas: &mut RgbImage,
        center: (i32, i32),
        radius: i32,
        color: Rgb<u8>,
    ) -> Result<()> {
        if radius < 0 {
            return Err(anyhow!("circle radius must be non-negative"));
        }
        imageproc::drawing::draw_hollow_circle_mut(canvas, center, radius, color);
        Ok(())
    }
}

/// Keep only candidates that are the strongest response inside their
/// `block_size` x `block_size` neighborhood.
fn local_maxima(candidates: Vec<Corner>, width: u32, height: u32, block_size: u32) -> Vec<Corner> {
    let half = (block_size / 2) as i64;
    if half == 0 {
        return candidates;
    }
    let w = width as usize;
    let mut scores = vec![f32::NEG_INFINITY; w * height as usize];
    for c in &candidates {
        scores[c.y as usize * w + c.x as usize] = c.score;
    }

    candidates
        .into_iter()
        .filter(|c| {
            let (cx, cy) = (c.x as i64, c.y as i64);
            for y in (cy - half).max(0)..=(cy + half).min(height as i64 - 1) {
                for x in (cx - half).max(0)..=(cx + half).min(width as i64 - 1) {
                    if (x, y) == (cx, cy) {
                        continue;
                    }
                    let other = scores[y as usize * w + x as usize];
                    // Ties go to the earlier pixel in raster order.
                    if other > c.score || (other == c.score && (y, x) < (cy, cx)) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}
