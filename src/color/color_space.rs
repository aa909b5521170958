//! Configure Image Data (CID) parsing and the base/indexed color spaces it
//! builds, per pccid.h/pccid.c.

use crate::error::{PclError, PclResult};
use crate::pcl_enum;

pcl_enum! {
    /// The five 5c color spaces. There is no separate monochrome space; a
    /// monochrome simple palette is just an `DeviceRgb` space with a two-entry
    /// 1-bit/index palette (white, black).
    pub enum ColorSpaceKind {
        DeviceRgb = 0,
        DeviceCmy = 1,
        ColorimetricRgb = 2,
        CieLab = 3,
        LuminanceChrominance = 4,
    }
}

impl ColorSpaceKind {
    fn from_byte(b: u8) -> PclResult<Self> {
        Self::from_i16(b as i16)
    }

    pub fn is_device_independent(self) -> bool {
        !matches!(self, ColorSpaceKind::DeviceRgb | ColorSpaceKind::DeviceCmy)
    }
}

pcl_enum! {
    pub enum PixelEncoding {
        IndexedByPlane = 0,
        IndexedByPixel = 1,
        DirectByPlane = 2,
        DirectByPixel = 3,
    }
}

impl PixelEncoding {
    fn from_byte(b: u8) -> PclResult<Self> {
        Self::from_i16(b as i16)
    }

    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            PixelEncoding::IndexedByPlane | PixelEncoding::IndexedByPixel
        )
    }
}

/// The short-form header, common to every CID variant (pcl_cid_hdr_common).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cid {
    pub space_kind: ColorSpaceKind,
    pub encoding: PixelEncoding,
    pub bits_per_index: u8,
    pub bits_per_primary: [u8; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct Chromaticity {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct NonLinearity {
    pub gamma: f32,
    pub gain: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

/// The long-form extension, one variant per `space_kind`. Matches the union
/// in `pcl_cid_data_s`: a device space carries white/black references, the
/// device-independent spaces carry colorimetric metadata and min/max ranges.
#[derive(Debug, Clone)]
pub enum CidParams {
    Device {
        white_ref: [i16; 3],
        black_ref: [i16; 3],
    },
    Colorimetric {
        chroma: [Chromaticity; 4],
        nonlin: [NonLinearity; 3],
        range: [ValueRange; 3],
    },
    CieLab {
        range: [ValueRange; 3],
    },
    LuminanceChrominance {
        matrix: [f32; 9],
        range: [ValueRange; 3],
        chroma: [Chromaticity; 4],
        nonlin: [NonLinearity; 3],
    },
}

fn expected_long_form_len(kind: ColorSpaceKind) -> u16 {
    match kind {
        ColorSpaceKind::DeviceRgb | ColorSpaceKind::DeviceCmy => 18,
        ColorSpaceKind::ColorimetricRgb => 86,
        ColorSpaceKind::CieLab => 30,
        ColorSpaceKind::LuminanceChrominance => 122,
    }
}

fn be_i16(buf: &[u8]) -> i16 {
    i16::from_be_bytes([buf[0], buf[1]])
}

fn be_f32(buf: &[u8]) -> f32 {
    f32::from_bits(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

fn read_i16_array<const N: usize>(buf: &[u8]) -> [i16; N] {
    let mut out = [0i16; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = be_i16(&buf[i * 2..]);
    }
    out
}

fn read_f32_array<const N: usize>(buf: &[u8]) -> [f32; N] {
    let mut out = [0f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = be_f32(&buf[i * 4..]);
    }
    out
}

impl Cid {
    /// Parses a Configure Image Data payload. `bytes` is the full `* v # W`
    /// payload, including the 6-byte short-form header. Returns the header
    /// plus the long-form params when present (payload longer than 6 bytes).
    ///
    /// Zero bits-per-index maps to 1; zero bits-per-primary maps to 8;
    /// direct-by-pixel always forces bits-per-index to 8 (pccid.c
    /// `check_cid_hdr`).
    pub fn parse(bytes: &[u8]) -> PclResult<(Cid, Option<CidParams>)> {
        if bytes.len() < 6 {
            return Err(PclError::invalid("configure image data payload too short"));
        }

        let space_kind = ColorSpaceKind::from_byte(bytes[0])?;
        let encoding = PixelEncoding::from_byte(bytes[1])?;
        let mut bits_per_index = bytes[2];
        let mut bits_per_primary = [bytes[3], bytes[4], bytes[5]];

        if encoding == PixelEncoding::DirectByPixel {
            bits_per_index = 8;
        }
        if bits_per_index == 0 {
            bits_per_index = 1;
        }
        for b in bits_per_primary.iter_mut() {
            if *b == 0 {
                *b = 8;
            }
        }

        let cid = Cid {
            space_kind,
            encoding,
            bits_per_index,
            bits_per_primary,
        };

        if bytes.len() == 6 {
            return Ok((cid, None));
        }

        let want = expected_long_form_len(space_kind);
        if bytes.len() as u16 != want {
            return Err(PclError::invalid(format!(
                "configure image data long form for {space_kind:?} must be {want} bytes, got {}",
                bytes.len()
            )));
        }

        let params = match space_kind {
            ColorSpaceKind::DeviceRgb | ColorSpaceKind::DeviceCmy => CidParams::Device {
                white_ref: read_i16_array(&bytes[6..12]),
                black_ref: read_i16_array(&bytes[12..18]),
            },
            ColorSpaceKind::ColorimetricRgb => {
                let chroma_f: [f32; 8] = read_f32_array(&bytes[6..38]);
                let nonlin_f: [f32; 6] = read_f32_array(&bytes[38..62]);
                let mut range_f: [f32; 6] = read_f32_array(&bytes[62..86]);
                for v in range_f.iter_mut() {
                    *v /= 255.0;
                }
                CidParams::Colorimetric {
                    chroma: chroma_pairs(chroma_f),
                    nonlin: nonlin_pairs(nonlin_f),
                    range: range_pairs(range_f),
                }
            }
            ColorSpaceKind::CieLab => {
                let range_f: [f32; 6] = read_f32_array(&bytes[6..30]);
                CidParams::CieLab {
                    range: range_pairs(range_f),
                }
            }
            ColorSpaceKind::LuminanceChrominance => {
                let matrix = read_f32_array(&bytes[6..42]);
                let range_f: [f32; 6] = read_f32_array(&bytes[42..66]);
                let chroma_f: [f32; 8] = read_f32_array(&bytes[66..98]);
                let nonlin_f: [f32; 6] = read_f32_array(&bytes[98..122]);
                CidParams::LuminanceChrominance {
                    matrix,
                    range: range_pairs(range_f),
                    chroma: chroma_pairs(chroma_f),
                    nonlin: nonlin_pairs(nonlin_f),
                }
            }
        };

        Ok((cid, Some(params)))
    }
}

fn chroma_pairs(flat: [f32; 8]) -> [Chromaticity; 4] {
    std::array::from_fn(|i| Chromaticity {
        x: flat[i * 2],
        y: flat[i * 2 + 1],
    })
}

fn nonlin_pairs(flat: [f32; 6]) -> [NonLinearity; 3] {
    std::array::from_fn(|i| NonLinearity {
        gamma: flat[i * 2],
        gain: flat[i * 2 + 1],
    })
}

fn range_pairs(flat: [f32; 6]) -> [ValueRange; 3] {
    std::array::from_fn(|i| ValueRange {
        min: flat[i * 2],
        max: flat[i * 2 + 1],
    })
}

/// SMPTE-C-like chromaticity used when CIE color substitution kicks in.
const SRGB_LIKE_CHROMA: [Chromaticity; 4] = [
    Chromaticity { x: 0.640, y: 0.340 },
    Chromaticity { x: 0.310, y: 0.595 },
    Chromaticity { x: 0.155, y: 0.070 },
    Chromaticity { x: 0.313, y: 0.329 },
];

/// A per-primary normalization: maps a raw component value through the
/// black reference and inverse range to a `0..=1` intensity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalization {
    pub blackref: f32,
    pub inv_range: f32,
}

/// An installed color space: the CID header that built it plus the derived
/// normalization and PostScript-style `Decode` array (§4.3).
#[derive(Debug, Clone)]
pub struct ColorSpace {
    pub cid: Cid,
    pub params: Option<CidParams>,
    /// The space actually requested, before any CIE substitution. Default
    /// palette generation still uses this to pick the right ordering.
    pub original_kind: ColorSpaceKind,
    pub norm: [Normalization; 3],
    pub decode: [f32; 6],
}

impl ColorSpace {
    /// Builds the base (non-indexed) color space described by `cid`,
    /// applying CIE-color substitution and cluster collapse as configured.
    pub fn build_base(
        cid: Cid,
        params: Option<CidParams>,
        use_cie_color: bool,
        collapse_to_colorimetric: bool,
    ) -> ColorSpace {
        let original_kind = cid.space_kind;
        let mut cid = cid;
        let mut params = params;

        let is_short_form = params.is_none();
        let wants_substitution = use_cie_color
            && matches!(
                original_kind,
                ColorSpaceKind::DeviceRgb | ColorSpaceKind::DeviceCmy
            );
        let wants_collapse =
            collapse_to_colorimetric && is_short_form && original_kind.is_device_independent();

        if wants_substitution || wants_collapse {
            cid.space_kind = ColorSpaceKind::ColorimetricRgb;
            params = Some(CidParams::Colorimetric {
                chroma: SRGB_LIKE_CHROMA,
                nonlin: [NonLinearity {
                    gamma: 2.2,
                    gain: 1.0,
                }; 3],
                range: [ValueRange { min: 0.0, max: 1.0 }; 3],
            });
        }

        let mut space = ColorSpace {
            cid,
            params,
            original_kind,
            norm: [Normalization::default(); 3],
            decode: [0.0; 6],
        };
        space.set_norm_and_decode_default();
        space
    }

    fn set_norm_and_decode_default(&mut self) {
        match &self.params {
            Some(CidParams::Device {
                white_ref,
                black_ref,
            }) => {
                let white_ref = *white_ref;
                let black_ref = *black_ref;
                self.set_norm_and_decode(
                    [white_ref[0] as f32, white_ref[1] as f32, white_ref[2] as f32],
                    [black_ref[0] as f32, black_ref[1] as f32, black_ref[2] as f32],
                );
            }
            _ => self.set_norm_and_decode([255.0; 3], [0.0; 3]),
        }
    }

    /// Stores `(blackref_i, inv_range_i)` per component and recomputes the
    /// `Decode` array, per §4.3 (`inv_range = 255/(whiteref-blackref)`).
    pub fn set_norm_and_decode(&mut self, white: [f32; 3], black: [f32; 3]) {
        for i in 0..3 {
            let range = (white[i] - black[i]).abs();
            let inv_range = if range == 0.0 { 0.0 } else { 255.0 / range };
            self.norm[i] = Normalization {
                blackref: black[i],
                inv_range,
            };
        }

        if self.cid.encoding.is_indexed() {
            let max_index = (1u32 << self.cid.bits_per_index) - 1;
            self.decode = [0.0, max_index as f32, 0.0, max_index as f32, 0.0, max_index as f32];
            return;
        }

        for i in 0..3 {
            let n = self.cid.bits_per_primary[i];
            let max_val = ((1u32 << n) - 1) as f32;
            let norm = self.norm[i];
            self.decode[i * 2] = -norm.blackref * norm.inv_range / 255.0;
            self.decode[i * 2 + 1] = (max_val - norm.blackref) * norm.inv_range / 255.0;
        }
    }

    /// Normalizes a raw component triple (in whatever range this space's
    /// white/black references describe) into a `0..=255`-scaled RGB triple
    /// using this space's black reference/inverse range.
    pub fn normalize(&self, raw: [f32; 3]) -> [f32; 3] {
        std::array::from_fn(|i| {
            let n = self.norm[i];
            (raw[i] - n.blackref) * n.inv_range
        })
    }

    /// Normalizes a raw component triple into the palette's permanent
    /// `0..=255` storage form (§3: "Values written to the palette are
    /// always stored in [0,255] ... regardless of source space"). Rounds
    /// half away from zero, per `64 * (255/128) = 127.5 -> 128`.
    pub fn normalize_to_bytes(&self, raw: [f32; 3]) -> [u8; 3] {
        let n = self.normalize(raw);
        std::array::from_fn(|i| n[i].round().clamp(0.0, 255.0) as u8)
    }

    /// Installs a color-lookup table override on a device-independent base
    /// space (§4.3 `update_lookup_tbl`). Forces a fresh `Decode`/norm
    /// computation so any indexed space tied to this base is rebuilt on
    /// next lookup.
    pub fn update_lookup_tbl(&mut self, white: [f32; 3], black: [f32; 3]) {
        self.set_norm_and_decode(white, black);
    }

    pub fn is_white(rgb: [u8; 3]) -> bool {
        rgb == [0xff, 0xff, 0xff]
    }

    pub fn is_black(rgb: [u8; 3]) -> bool {
        rgb == [0x00, 0x00, 0x00]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_form_has_no_params() {
        let bytes = [0u8, 1, 8, 8, 8, 8];
        let (cid, params) = Cid::parse(&bytes).unwrap();
        assert_eq!(cid.space_kind, ColorSpaceKind::DeviceRgb);
        assert_eq!(cid.encoding, PixelEncoding::IndexedByPixel);
        assert!(params.is_none());
    }

    #[test]
    fn zero_bits_per_index_defaults_to_one() {
        let bytes = [0u8, 0, 0, 8, 8, 8];
        let (cid, _) = Cid::parse(&bytes).unwrap();
        assert_eq!(cid.bits_per_index, 1);
    }

    #[test]
    fn direct_by_pixel_forces_eight_bit_index() {
        let bytes = [0u8, 3, 0, 8, 8, 8];
        let (cid, _) = Cid::parse(&bytes).unwrap();
        assert_eq!(cid.bits_per_index, 8);
    }

    #[test]
    fn long_form_length_mismatch_is_rejected() {
        let bytes = [0u8, 1, 8, 8, 8, 8, 0, 0];
        assert!(Cid::parse(&bytes).is_err());
    }

    #[test]
    fn device_long_form_parses_white_and_black_refs() {
        let mut bytes = vec![0u8, 1, 8, 8, 8, 8];
        bytes.extend_from_slice(&255i16.to_be_bytes());
        bytes.extend_from_slice(&255i16.to_be_bytes());
        bytes.extend_from_slice(&255i16.to_be_bytes());
        bytes.extend_from_slice(&0i16.to_be_bytes());
        bytes.extend_from_slice(&0i16.to_be_bytes());
        bytes.extend_from_slice(&0i16.to_be_bytes());

        let (_, params) = Cid::parse(&bytes).unwrap();
        match params.unwrap() {
            CidParams::Device {
                white_ref,
                black_ref,
            } => {
                assert_eq!(white_ref, [255, 255, 255]);
                assert_eq!(black_ref, [0, 0, 0]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_array_for_direct_encoding_matches_bits_per_primary() {
        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceRgb,
            encoding: PixelEncoding::DirectByPlane,
            bits_per_index: 1,
            bits_per_primary: [8, 8, 8],
        };
        let space = ColorSpace::build_base(cid, None, false, false);
        assert_eq!(space.decode[0], 0.0);
        assert!((space.decode[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decode_array_for_indexed_encoding_spans_index_range() {
        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceRgb,
            encoding: PixelEncoding::IndexedByPixel,
            bits_per_index: 2,
            bits_per_primary: [8, 8, 8],
        };
        let space = ColorSpace::build_base(cid, None, false, false);
        assert_eq!(space.decode, [0.0, 3.0, 0.0, 3.0, 0.0, 3.0]);
    }

    #[test]
    fn use_cie_color_rewrites_device_rgb_to_colorimetric() {
        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceRgb,
            encoding: PixelEncoding::DirectByPixel,
            bits_per_index: 8,
            bits_per_primary: [8, 8, 8],
        };
        let space = ColorSpace::build_base(cid, None, true, false);
        assert_eq!(space.cid.space_kind, ColorSpaceKind::ColorimetricRgb);
        assert_eq!(space.original_kind, ColorSpaceKind::DeviceRgb);
    }
}
