//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::params::RenderConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Motionweave")]
#[command(about = "Audio-reactive multi-pass visual compositor", long_about = None)]
pub struct Args {
    /// Media pack directory (images plus an artifacts.json manifest)
    #[arg(long, value_name = "DIR")]
    pub pack: Option<PathBuf>,

    /// Seed for the opening pattern and texture selection (random if omitted)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u32>,

    /// Audio capture device, matched by name substring
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// List audio capture devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Window width (pixels)
    #[arg(long, value_name = "PIXELS", default_value = "1280")]
    pub width: u32,

    /// Window height (pixels)
    #[arg(long, value_name = "PIXELS", default_value = "720")]
    pub height: u32,
}

impl Args {
    /// Render configuration with the window size applied
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            window_width: self.width.max(1),
            window_height: self.height.max(1),
            ..RenderConfig::default()
        }
    }
}
