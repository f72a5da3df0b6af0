//! Motionweave library - audio-reactive multi-pass visual compositing

pub mod audio;
pub mod cli;
pub mod compositor;
pub mod pack;
pub mod params;
pub mod reset;
pub mod textures;
pub mod uniforms;
