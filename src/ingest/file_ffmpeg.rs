//! Local video file source using FFmpeg.
//!
//! Decodes the best video stream of a local file to RGB24 in memory, one
//! frame per call. Once the container runs out of packets the decoder is
//! flushed and the stream ends.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use super::FrameSource;
use crate::frame::{Frame, PixelFormat};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: Option<ffmpeg::format::context::Input>,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    flushed: bool,
    closed: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input: Some(input),
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            flushed: false,
            closed: false,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: connected to {} ({}x{}, ffmpeg)",
            self.config.path,
            self.decoder.width(),
            self.decoder.height()
        );
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(err) if decoder_drained(&err) => return Ok(None),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("decode frame from {}", self.config.path)))
            }
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frame_count += 1;
        Frame::new(width, height, PixelFormat::Rgb8, pixels).map(Some)
    }

    fn pump(&mut self, input: &mut ffmpeg::format::context::Input) -> Result<Option<Frame>> {
        for (stream, packet) in input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
        }

        if !self.flushed {
            self.flushed = true;
            self.decoder.send_eof().context("flush ffmpeg decoder")?;
            return self.receive();
        }
        Ok(None)
    }
}

impl FrameSource for FfmpegFileSource {
    fn describe(&self) -> String {
        format!("video file {}", self.config.path)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(frame) = self.receive()? {
            return Ok(Some(frame));
        }
        let Some(mut input) = self.input.take() else {
            return Ok(None);
        };
        let result = self.pump(&mut input);
        self.input = Some(input);
        result
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input = None;
            log::info!(
                "FileSource: closed {} after {} frames",
                self.config.path,
                self.frame_count
            );
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for FfmpegFileSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// The decoder needs more input (EAGAIN) or has been fully flushed (EOF).
/// Anything else is a real decode error.
fn decoder_drained(err: &ffmpeg::Error) -> bool {
    match err {
        ffmpeg::Error::Eof => true,
        ffmpeg::Error::Other { errno } => *errno == ffmpeg::error::EAGAIN,
        _ => false,
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
