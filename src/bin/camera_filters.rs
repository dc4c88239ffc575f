//! camera_filters - live camera view with switchable filters
//!
//! Keys: P preview, B blur, F corner features, C edges, Q or Esc to quit.
//! The picture is mirrored so the view behaves like a looking glass.

use anyhow::Result;
use clap::Parser;

use frame_pipeline::app::{default_sink, install_interrupt_flag, launch, Profile};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera index (default 0), video file, image pattern such as
    /// images/img_%02d.jpg, or stub://name for generated frames.
    source: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let profile = Profile::filters();
    let config = profile.config(args.source.as_deref())?;
    let interrupted = install_interrupt_flag()?;

    let summary = launch(&config, &profile, default_sink, Some(interrupted))?;
    log::info!("camera_filters finished: {}", serde_json::to_string(&summary)?);
    Ok(())
}
