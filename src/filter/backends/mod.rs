//! Filter library implementations.
//!
//! Available backends:
//! - `cpu`: `imageproc`-backed CPU implementation

mod cpu;

pub use cpu::CpuLibrary;
