//! The raster-graphics state machine, §4.7. `compression` decodes
//! individual scan-lines; `engine` drives graphics-mode entry/exit, row
//! ingestion and emission, and the blank-row shortcut around it.

pub mod compression;
pub mod engine;

pub use compression::{AdaptiveOp, CompressionMode, SeedRow};
pub use engine::{EntryMode, ExitMode, RasterEngine};

use crate::error::PclResult;

/// Legal raster resolutions; any requested value is rounded up to the next
/// one (600 is the ceiling). 120 dpi is deliberately absent (§3).
const LEGAL_RESOLUTIONS: [u16; 6] = [75, 100, 150, 200, 300, 600];

pub fn round_up_resolution(requested: u16) -> PclResult<u16> {
    for &r in &LEGAL_RESOLUTIONS {
        if requested <= r {
            return Ok(r);
        }
    }
    Ok(*LEGAL_RESOLUTIONS.last().unwrap())
}

/// A dimension that remembers whether it was ever explicitly set, since
/// several raster-entry decisions depend on that distinction rather than on
/// the value itself (§3 "RasterState").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimension {
    pub value: u32,
    pub explicit: bool,
}

impl Dimension {
    pub fn set(&mut self, value: u32) {
        self.value = value;
        self.explicit = true;
    }
}

/// Persistent raster state that survives across graphics-mode entries
/// within a page, per §3.
#[derive(Debug, Clone)]
pub struct RasterState {
    pub resolution_dpi: u16,
    pub src_width: Dimension,
    pub src_height: Dimension,
    pub dest_width_cp: Dimension,
    pub dest_height_cp: Dimension,
    pub presentation_mode_3: bool,
    pub scale_raster: bool,
    pub y_advance: i8,
    pub compression_mode: CompressionMode,
    pub graphics_mode: bool,
    pub clip_all: bool,
    pub gmargin_cp: f32,
    pub plane_index: usize,
    pub rows_rendered: u32,
}

impl Default for RasterState {
    fn default() -> Self {
        RasterState {
            resolution_dpi: 300,
            src_width: Dimension::default(),
            src_height: Dimension::default(),
            dest_width_cp: Dimension::default(),
            dest_height_cp: Dimension::default(),
            presentation_mode_3: false,
            scale_raster: true,
            y_advance: 1,
            compression_mode: CompressionMode::Uncompressed,
            graphics_mode: false,
            clip_all: false,
            gmargin_cp: 0.0,
            plane_index: 0,
            rows_rendered: 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolution_rounds_up_to_next_legal_value() {
        assert_eq!(round_up_resolution(120).unwrap(), 150);
        assert_eq!(round_up_resolution(300).unwrap(), 300);
        assert_eq!(round_up_resolution(601).unwrap(), 600);
    }

    #[test]
    fn dimension_set_flips_explicit_flag() {
        let mut d = Dimension::default();
        assert!(!d.explicit);
        d.set(42);
        assert!(d.explicit);
        assert_eq!(d.value, 42);
    }
}
