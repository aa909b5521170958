//! The parsed command stream this core consumes (§6.1). Tokenizing raw
//! escape sequences into these variants is someone else's job; this type
//! is the seam between that external tokenizer and
//! [`crate::interpreter::Interpreter`].

/// Clamps a numeric command argument to the legal `i16` range (§6.1: "All
/// numeric arguments are clamped to the i16 range").
pub fn clamp_arg(v: i64) -> i16 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Which of the three staged color components `* v # A/B/C` sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponentSlot {
    First,
    Second,
    Third,
}

/// One command in the exhaustive table of §6.1. Field names mirror the
/// escape-sequence mnemonic's own terms, not internal state names.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `* v # W` + payload: install a new palette descriptor.
    ConfigureImageData { payload: Vec<u8> },
    /// `* r # U`: simple palette select, enum -3/1/3.
    SelectSimplePalette { which: i16 },
    /// `* i # W` + payload: viewing illuminant `(x, y)`.
    SetIlluminant { x: f32, y: f32 },
    /// `* v # A/B/C`: stage one color component for the next assignment.
    StageColorComponent { slot: ColorComponentSlot, value: f32 },
    /// `* v # I`: assign staged components into a palette slot.
    AssignColorComponents { index: i16 },
    /// `* v # S`: build foreground from a palette slot.
    SetForeground { index: i16 },
    /// `* v # O`: pattern-transparent = `!arg`.
    SetPatternTransparentArg { arg: i16 },
    /// `* v # T`: select pattern type, 0..4.
    SelectPatternType { kind: i16 },
    /// `* c # G`: current pattern id.
    SetCurrentPatternId { id: u16 },
    /// `* c # W` + payload: define a user-defined pattern (header + bitmap).
    DefineUserPattern { payload: Vec<u8> },
    /// `* c # Q`: pattern control, 0/1/2/4/5.
    PatternControl { op: i16 },
    /// `* t # J`: rendering algorithm (dither/halftone), 0..14.
    SetRenderingAlgorithm { algorithm: i16 },
    /// `* p # P`: push (0) or pop (1) the palette stack.
    PalettePushPop { pop: bool },
    /// `* l # O`: raster operation, 0..255.
    SetRasterOperation { rop: u8 },
    /// `* l # R`: pixel placement mode, 0/1.
    SetPixelPlacement { grid: bool },
    /// `* t # R`: raster resolution, rounded up to a legal value.
    SetRasterResolution { dpi: u16 },
    /// `* r # F`: raster presentation mode, 0/3.
    SetRasterPresentationMode { mode: u8 },
    /// `* r # S`: raster source width, marks it explicit.
    SetRasterSourceWidth { pixels: u16 },
    /// `* r # T`: raster source height, marks it explicit.
    SetRasterSourceHeight { pixels: u16 },
    /// `* t # H`: raster destination width, centipoints.
    SetRasterDestWidth { centipoints: u16 },
    /// `* t # V`: raster destination height, centipoints.
    SetRasterDestHeight { centipoints: u16 },
    /// `* b # M`: compression mode, one of {0,1,2,3,5,9}.
    SetCompressionMode { mode: u8 },
    /// `* r # A`: start raster graphics, 0..3 selects scale/origin variant.
    StartRasterGraphics { variant: i16 },
    /// `* b # V` + payload: transfer one raster plane.
    TransferPlane { payload: Vec<u8> },
    /// `* b # W` + payload: transfer one raster row.
    TransferRow { payload: Vec<u8> },
    /// `* b # Y`: skip (zero-fill) rows.
    SkipRows { count: u16 },
    /// `* b # L`: line path direction, sets `y_advance`.
    SetLinePathDirection { reverse: bool },
    /// `* r B`: end graphics, keep margin and compression mode.
    EndGraphicsKeep,
    /// `* r C`: end graphics, reset margin and compression mode.
    EndGraphicsFull,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clamp_arg_saturates_at_i16_bounds() {
        assert_eq!(clamp_arg(1_000_000), i16::MAX);
        assert_eq!(clamp_arg(-1_000_000), i16::MIN);
        assert_eq!(clamp_arg(42), 42);
    }
}
