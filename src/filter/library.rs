use anyhow::Result;
use image::{GrayImage, Rgb, RgbImage};

/// Interest point reported by a filter library.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub x: u32,
    pub y: u32,
    /// Corner response; larger is stronger.
    pub score: f32,
}

/// Pixel-transform collaborator.
///
/// The pipeline core never does pixel math itself. Each filter stage calls
/// into one of these primitives and only arranges inputs and outputs.
///
/// Implementations must treat their inputs as read-only and must not retain
/// them beyond the call.
pub trait FilterLibrary: Send {
    /// Library identifier (for logs).
    fn name(&self) -> &'static str;

    /// Normalized box filter over a `kernel_size` x `kernel_size` neighborhood.
    fn box_blur(&mut self, plane: &GrayImage, kernel_size: u32) -> Result<GrayImage>;

    /// Candidate corners with their response scores, estimated over a
    /// `block_size` neighborhood. No quality or distance filtering.
    fn corner_responses(&mut self, gray: &GrayImage, block_size: u32) -> Result<Vec<Corner>>;

    /// Two-threshold edge-linking transform producing a binary edge map.
    fn canny(&mut self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage>;

    /// Draw a one-pixel unfilled circle.
    fn draw_hollow_circle(
        &mut self,
        canvas: &mut RgbImage,
        center: (i32, i32),
        radius: i32,
        color: Rgb<u8>,
    ) -> Result<()>;
}
