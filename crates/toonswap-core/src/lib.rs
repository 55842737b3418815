//! toonswap-core — Post-swap image filter pipeline.
//!
//! Three stateless filters over an 8-bit RGB buffer (edge-cartoon,
//! color-grade, grain-texture) and a sequencer that composes them in a
//! fixed order. Every filter preserves the input dimensions; the only
//! error conditions are an empty buffer or an out-of-range parameter.
//!
//! Channel order is RGB throughout the crate. Decoding and encoding live
//! at the HTTP/CLI boundary, so the convention cannot drift mid-pipeline.

use thiserror::Error;

pub mod buffer;
pub mod cartoon;
pub mod grade;
pub mod grain;
pub mod pipeline;
pub mod preset;

pub use pipeline::{Filter, Pipeline};
pub use preset::Preset;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("empty image buffer: {width}x{height} — both dimensions must be non-zero")]
    EmptyImage { width: u32, height: u32 },
    #[error("grain intensity {0} is outside [0, 1]")]
    InvalidIntensity(f32),
    #[error("unknown preset {0:?} — see `toonswap presets` for the built-in set")]
    UnknownPreset(String),
}
