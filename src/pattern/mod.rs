pub mod cache;
pub mod tiler;
pub mod transparency;

pub use cache::{PatternCache, PatternKey};
pub use tiler::{FillMode, PatternTiler};

use std::rc::Rc;

use crate::data_structures::{Matrix, Rectangle};
use crate::error::{PclError, PclResult};

/// Identifies a pattern slot, 0 meaning "no pattern" in most contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidShade {
    Black,
    White,
}

/// The five pattern families selectable by `* v # T` plus the `RasterColor`
/// kind used internally when a raster image is rendered through the pattern
/// path (image-as-pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Solid(SolidShade),
    /// Percent gray, 0..=100.
    Shading(u8),
    /// One of six built-in cross-hatch/line patterns, 0..=5.
    CrossHatch(u8),
    UserDefined(PatternId),
    CurrentPattern,
    RasterColor,
}

/// A downloaded user-defined pattern, prior to rendering into device space.
#[derive(Debug, Clone)]
pub struct UserPatternDef {
    pub format: u8,
    pub continuation: bool,
    pub encoding: u8,
    pub width: u16,
    pub height: u16,
    /// Row-major, row-packed monochrome bitmap: `ceil(width/8) * height`
    /// bytes, MSB-first within each row byte.
    pub bits: Rc<[u8]>,
}

impl UserPatternDef {
    pub fn parse(header: &[u8], bits: &[u8]) -> PclResult<UserPatternDef> {
        if header.len() < 8 {
            return Err(PclError::invalid("user-defined pattern header too short"));
        }
        let format = header[0];
        let continuation = header[1] != 0;
        let encoding = header[2];
        if encoding != 1 {
            return Err(PclError::invalid(format!(
                "unsupported user-defined pattern encoding {encoding}"
            )));
        }
        let height = u16::from_be_bytes([header[4], header[5]]);
        let width = u16::from_be_bytes([header[6], header[7]]);

        if width == 0 || height == 0 {
            return Err(PclError::invalid("user-defined pattern width/height must be nonzero"));
        }

        let row_bytes = (width as usize).div_ceil(8);
        let expected = row_bytes * height as usize;
        if bits.len() != expected {
            return Err(PclError::invalid(format!(
                "user-defined pattern bitmap length {} does not match {width}x{height} ({expected} expected)",
                bits.len()
            )));
        }

        Ok(UserPatternDef {
            format,
            continuation,
            encoding,
            width,
            height,
            bits: Rc::from(bits),
        })
    }
}

/// A rendered pattern tile, ready to be stepped across a fill region (§4.6).
#[derive(Debug, Clone)]
pub struct PatternTile {
    /// Device-ready monochrome or color bits for the tile cell.
    pub tbits: Rc<[u8]>,
    /// Optional 1-bit mask (for patterns with transparent background).
    pub tmask: Option<Rc<[u8]>>,
    /// Optional alpha plane used by the transparency-group blit path.
    pub ttrans: Option<Rc<[u8]>>,
    pub step: Matrix,
    pub bbox: Rectangle,
    pub width: u32,
    pub height: u32,
    /// A tile is "simple" when its step matrix is an unrotated, unskewed
    /// translation of exactly its own width/height — the device's native
    /// tiled-fill path can be used directly.
    pub is_simple: bool,
    pub has_overlap: bool,
    pub bits_used: usize,
}

impl PatternTile {
    pub fn solid(shade: SolidShade, width: u32, height: u32) -> PatternTile {
        let value = match shade {
            SolidShade::White => 0xffu8,
            SolidShade::Black => 0x00u8,
        };
        let row_bytes = (width as usize).div_ceil(8);
        let tbits: Rc<[u8]> = Rc::from(vec![value; row_bytes * height as usize]);
        PatternTile {
            bits_used: tbits.len(),
            tbits,
            tmask: None,
            ttrans: None,
            step: Matrix::scale(width as f32, height as f32),
            bbox: Rectangle::new(0.0, 0.0, width as f32, height as f32),
            width,
            height,
            is_simple: true,
            has_overlap: false,
        }
    }

    /// Renders a uniform-intensity tile for a `Shading(pct)` pattern: `pct`
    /// percent gray, 0 = white, 100 = black, as a single packed RGB pixel.
    pub fn shading(pct: u8) -> PatternTile {
        let level = 255 - ((pct.min(100) as u32 * 255) / 100) as u8;
        let tbits: Rc<[u8]> = Rc::from([level, level, level]);
        PatternTile {
            bits_used: tbits.len(),
            tbits,
            tmask: None,
            ttrans: None,
            step: Matrix::scale(1.0, 1.0),
            bbox: Rectangle::new(0.0, 0.0, 1.0, 1.0),
            width: 1,
            height: 1,
            is_simple: true,
            has_overlap: false,
        }
    }

    /// One of the six built-in cross-hatch/line fills (§3 `PatternKind::CrossHatch`),
    /// an 8x8 monochrome cell of evenly spaced lines at a per-index angle.
    pub fn cross_hatch(index: u8, fg: [u8; 3]) -> PatternTile {
        const SIZE: u32 = 8;
        let mut mono = [[false; 8]; 8];
        match index % 6 {
            0 => mono.iter_mut().step_by(2).for_each(|row| row.fill(true)), // horizontal
            1 => {
                for row in mono.iter_mut() {
                    for (x, px) in row.iter_mut().enumerate() {
                        *px = x % 2 == 0;
                    }
                } // vertical
            }
            2 => {
                for (y, row) in mono.iter_mut().enumerate() {
                    row[y] = true;
                } // diagonal "/"
            }
            3 => {
                for (y, row) in mono.iter_mut().enumerate() {
                    row[7 - y] = true;
                } // diagonal "\"
            }
            4 => {
                for (y, row) in mono.iter_mut().enumerate() {
                    row[y] = true;
                    row[7 - y] = true;
                } // crosshatch diagonal
            }
            _ => {
                for (y, row) in mono.iter_mut().enumerate() {
                    if y % 2 == 0 {
                        row.fill(true);
                    }
                    for (x, px) in row.iter_mut().enumerate() {
                        *px = *px || x % 2 == 0;
                    }
                } // grid
            }
        }

        let mut tbits = Vec::with_capacity((SIZE * SIZE * 3) as usize);
        for row in mono {
            for set in row {
                if set {
                    tbits.extend_from_slice(&fg);
                } else {
                    tbits.extend_from_slice(&[0xff, 0xff, 0xff]);
                }
            }
        }

        PatternTile {
            bits_used: tbits.len(),
            tbits: Rc::from(tbits),
            tmask: None,
            ttrans: None,
            step: Matrix::scale(SIZE as f32, SIZE as f32),
            bbox: Rectangle::new(0.0, 0.0, SIZE as f32, SIZE as f32),
            width: SIZE,
            height: SIZE,
            is_simple: true,
            has_overlap: false,
        }
    }
}

impl UserPatternDef {
    /// Expands the 1-bit-per-pixel bitmap into an RGB tile: `fg` for set
    /// bits, `bg` for clear bits when present, else clear bits become a
    /// transparent-background mask (§3 "UserDefined" pattern kind).
    pub fn render(&self, fg: [u8; 3], bg: Option<[u8; 3]>) -> PatternTile {
        let row_bytes = (self.width as usize).div_ceil(8);
        let mut tbits = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        let mut tmask = Vec::with_capacity(row_bytes * self.height as usize);

        for y in 0..self.height as usize {
            let row = &self.bits[y * row_bytes..(y + 1) * row_bytes];
            let mut mask_byte = 0u8;
            for x in 0..self.width as usize {
                let bit_set = (row[x / 8] >> (7 - (x % 8))) & 1 != 0;
                let color = if bit_set {
                    fg
                } else {
                    bg.unwrap_or([0xff, 0xff, 0xff])
                };
                tbits.extend_from_slice(&color);
                if bit_set {
                    mask_byte |= 1 << (7 - (x % 8));
                }
                if x % 8 == 7 {
                    tmask.push(mask_byte);
                    mask_byte = 0;
                }
            }
            if self.width as usize % 8 != 0 {
                tmask.push(mask_byte);
            }
        }

        let bits_used = tbits.len() + tmask.len();
        PatternTile {
            tbits: Rc::from(tbits),
            tmask: if bg.is_none() { Some(Rc::from(tmask)) } else { None },
            ttrans: None,
            step: Matrix::scale(self.width as f32, self.height as f32),
            bbox: Rectangle::new(0.0, 0.0, self.width as f32, self.height as f32),
            width: self.width as u32,
            height: self.height as u32,
            is_simple: true,
            has_overlap: false,
            bits_used,
        }
    }
}

/// Non-negative remainder, used by the simple-tile phase computation (§4.6).
pub fn imod(a: i64, m: i64) -> i64 {
    if m == 0 {
        return 0;
    }
    ((a % m) + m) % m
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn imod_is_always_non_negative() {
        assert_eq!(imod(-1, 4), 3);
        assert_eq!(imod(5, 4), 1);
        assert_eq!(imod(0, 4), 0);
    }

    #[test]
    fn zero_width_pattern_header_is_invalid() {
        let header = [0u8, 0, 1, 0, 0, 4, 0, 0];
        assert!(UserPatternDef::parse(&header, &[]).is_err());
    }

    #[test]
    fn bitmap_length_must_match_declared_dimensions() {
        let header = [0u8, 0, 1, 0, 0, 4, 0, 8]; // 8 wide, 4 tall -> 1 byte/row * 4
        assert!(UserPatternDef::parse(&header, &[0u8; 3]).is_err());
        assert!(UserPatternDef::parse(&header, &[0u8; 4]).is_ok());
    }

    #[test]
    fn user_pattern_render_uses_foreground_for_set_bits() {
        let header = [0u8, 0, 1, 0, 0, 1, 0, 8];
        let def = UserPatternDef::parse(&header, &[0b1000_0000]).unwrap();
        let tile = def.render([1, 2, 3], None);
        assert_eq!(&tile.tbits[0..3], &[1, 2, 3]);
        assert_eq!(&tile.tbits[3..6], &[0xff, 0xff, 0xff]);
        assert!(tile.tmask.is_some());
    }

    #[test]
    fn shading_zero_percent_is_white() {
        let tile = PatternTile::shading(0);
        assert_eq!(&tile.tbits[..], &[0xff, 0xff, 0xff]);
    }

    #[test]
    fn shading_full_percent_is_black() {
        let tile = PatternTile::shading(100);
        assert_eq!(&tile.tbits[..], &[0x00, 0x00, 0x00]);
    }
}
