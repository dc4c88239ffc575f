//! Desktop window sink backed by minifb.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::{to_0rgb, DisplaySink};
use crate::frame::Frame;
use crate::mode::KeyEvent;

const POLL_SLICE: Duration = Duration::from_millis(1);

/// A window sized to the first frame it shows.
pub struct WindowSink {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    closed: bool,
}

impl WindowSink {
    /// The window itself is created lazily by the first `present`.
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
            width: 0,
            height: 0,
            closed: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn open(&mut self, width: usize, height: usize) -> Result<()> {
        let window = Window::new(
            &self.title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("failed to create window: {}", e))?;
        log::info!(
            "WindowSink: opened '{}' ({}x{})",
            self.title,
            width,
            height
        );
        self.window = Some(window);
        Ok(())
    }
}

fn map_key(key: Key) -> Option<KeyEvent> {
    let letter = match key {
        Key::Escape => return Some(KeyEvent::ESCAPE),
        Key::A => 'a',
        Key::B => 'b',
        Key::C => 'c',
        Key::D => 'd',
        Key::E => 'e',
        Key::F => 'f',
        Key::G => 'g',
        Key::H => 'h',
        Key::I => 'i',
        Key::J => 'j',
        Key::K => 'k',
        Key::L => 'l',
        Key::M => 'm',
        Key::N => 'n',
        Key::O => 'o',
        Key::P => 'p',
        Key::Q => 'q',
        Key::R => 'r',
        Key::S => 's',
        Key::T => 't',
        Key::U => 'u',
        Key::V => 'v',
        Key::W => 'w',
        Key::X => 'x',
        Key::Y => 'y',
        Key::Z => 'z',
        Key::Space => ' ',
        _ => return None,
    };
    Some(KeyEvent::char(letter))
}

impl DisplaySink for WindowSink {
    fn present(&mut self, frame: Frame) -> Result<()> {
        if self.closed {
            return Err(anyhow!("window '{}' is closed", self.title));
        }
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if self.window.is_none() {
            self.open(width, height)?;
        }
        self.width = width;
        self.height = height;
        to_0rgb(&frame, &mut self.buffer);

        let window = self
            .window
            .as_mut()
            .ok_or_else(|| anyhow!("window '{}' is not open", self.title))?;
        window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("window update failed: {}", e))
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        if self.closed {
            return Err(anyhow!("window '{}' is closed", self.title));
        }
        let Some(window) = self.window.as_mut() else {
            std::thread::sleep(timeout);
            return Ok(None);
        };

        let deadline = Instant::now() + timeout;
        loop {
            window.update();
            if !window.is_open() {
                log::info!("WindowSink: '{}' closed by user", self.title);
                return Ok(Some(KeyEvent::ESCAPE));
            }
            if let Some(key) = window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .find_map(map_key)
            {
                return Ok(Some(key));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if self.window.take().is_some() {
                log::info!("WindowSink: closed '{}'", self.title);
            }
        }
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        self.close();
    }
}
