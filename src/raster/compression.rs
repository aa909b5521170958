//! Raster line-decompression, §4.1. Ported from `rtrstcmp.c`'s
//! `uncompress_{0,1,2,3,9}`; mode 5 (adaptive) is parsed here but executed
//! by [`crate::raster::engine::RasterEngine`], since it drives row
//! emission rather than filling a single seed row.

use crate::error::{PclError, PclResult};

/// A per-plane scan-line buffer retained across rows (§3 "SeedRow").
#[derive(Debug, Clone)]
pub struct SeedRow {
    pub pdata: Vec<u8>,
    pub is_blank: bool,
}

impl SeedRow {
    pub fn new(size: usize) -> SeedRow {
        SeedRow {
            pdata: vec![0; size],
            is_blank: true,
        }
    }

    pub fn size(&self) -> usize {
        self.pdata.len()
    }

    /// Explicitly zeroes the row. Called on every plane during a block of
    /// skipped rows so delta-row decoding against a blank prior row behaves
    /// correctly (§4.7.4).
    pub fn clear(&mut self) {
        self.pdata.fill(0);
        self.is_blank = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Uncompressed,
    RunLength,
    Packbits,
    DeltaRow,
    Adaptive,
    ModifiedDeltaRow,
}

impl CompressionMode {
    pub fn from_u8(v: u8) -> PclResult<Self> {
        Ok(match v {
            0 => CompressionMode::Uncompressed,
            1 => CompressionMode::RunLength,
            2 => CompressionMode::Packbits,
            3 => CompressionMode::DeltaRow,
            5 => CompressionMode::Adaptive,
            9 => CompressionMode::ModifiedDeltaRow,
            other => return Err(PclError::invalid(format!("unsupported compression mode {other}"))),
        })
    }
}

/// Decodes `input` into `seed` per `mode`. Adaptive compression cannot be
/// decoded through this entry point: it must be driven row-by-row by the
/// raster engine via [`parse_adaptive`].
pub fn decode(mode: CompressionMode, seed: &mut SeedRow, input: &[u8]) -> PclResult<()> {
    match mode {
        CompressionMode::Uncompressed => decode_uncompressed(seed, input),
        CompressionMode::RunLength => decode_run_length(seed, input),
        CompressionMode::Packbits => decode_packbits(seed, input),
        CompressionMode::DeltaRow => decode_delta_row(seed, input),
        CompressionMode::ModifiedDeltaRow => decode_modified_delta_row(seed, input),
        CompressionMode::Adaptive => {
            return Err(PclError::protocol(
                "adaptive compression must be driven row-by-row, not decoded directly",
            ))
        }
    }
    Ok(())
}

fn decode_uncompressed(seed: &mut SeedRow, input: &[u8]) {
    let n = input.len().min(seed.size());
    seed.pdata[..n].copy_from_slice(&input[..n]);
    if !seed.is_blank {
        seed.pdata[n..].fill(0);
    }
    seed.is_blank = input.is_empty();
}

fn decode_run_length(seed: &mut SeedRow, input: &[u8]) {
    let size = seed.size();
    let mut pos = 0usize;
    let pairs = input.len() / 2;

    for i in 0..pairs {
        let cnt = (input[i * 2] as usize + 1).min(size - pos);
        let val = input[i * 2 + 1];
        seed.pdata[pos..pos + cnt].fill(val);
        pos += cnt;
    }

    if !seed.is_blank {
        seed.pdata[pos..].fill(0);
    }
    seed.is_blank = input.is_empty();
}

fn decode_packbits(seed: &mut SeedRow, input: &[u8]) {
    let size = seed.size();
    let mut pos = 0usize;
    let mut idx = 0usize;

    while idx < input.len() && pos < size {
        let cntrl = input[idx];
        idx += 1;

        if cntrl < 128 {
            let avail = input.len() - idx;
            let cnt = (cntrl as usize + 1).min(avail);
            let take = cnt.min(size - pos);
            seed.pdata[pos..pos + take].copy_from_slice(&input[idx..idx + take]);
            idx += cnt;
            pos += take;
        } else if cntrl > 128 {
            if idx >= input.len() {
                break;
            }
            let val = input[idx];
            idx += 1;
            let cnt = (257 - cntrl as usize).min(size - pos);
            seed.pdata[pos..pos + cnt].fill(val);
            pos += cnt;
        }
        // cntrl == 128 is a no-op.
    }

    if !seed.is_blank {
        seed.pdata[pos..].fill(0);
    }
    seed.is_blank = input.is_empty();
}

fn decode_delta_row(seed: &mut SeedRow, input: &[u8]) {
    let size = seed.size();
    let was_blank = seed.is_blank;
    let mut pos = 0usize;
    let mut idx = 0usize;

    while idx < input.len() {
        let val = input[idx] as usize;
        idx += 1;

        let mut cnt = (val >> 5) + 1;
        let mut offset = val & 0x1f;

        if offset == 0x1f {
            while idx < input.len() {
                let add = input[idx] as usize;
                idx += 1;
                offset += add;
                if add != 0xff {
                    break;
                }
            }
        }

        cnt = cnt.min(input.len() - idx);
        let repl_start = idx;
        idx += cnt;

        pos += offset;
        if pos >= size {
            break;
        }

        let take = cnt.min(size - pos);
        seed.pdata[pos..pos + take].copy_from_slice(&input[repl_start..repl_start + take]);
        pos += take;
    }

    seed.is_blank = was_blank && input.is_empty();
}

fn decode_modified_delta_row(seed: &mut SeedRow, input: &[u8]) {
    let size = seed.size();
    let was_blank = seed.is_blank;
    let mut pos = 0usize;
    let mut idx = 0usize;

    while idx < input.len() {
        let val = input[idx] as usize;
        idx += 1;
        let comp = val & 0x80 != 0;

        let (mut offset, mut more_offset, cnt, mut more_cnt) = if comp {
            let offset = (val >> 5) & 0x3;
            (offset, offset == 0x3, (val & 0x1f) + 1, (val & 0x1f) + 1 == 0x20)
        } else {
            let offset = (val >> 3) & 0xf;
            (offset, offset == 0xf, (val & 0x7) + 1, (val & 0x7) + 1 == 0x8)
        };

        while more_offset && idx < input.len() {
            let extra = input[idx] as usize;
            idx += 1;
            more_offset = extra == 0xff;
            offset += extra;
        }
        while more_cnt && idx < input.len() {
            let extra = input[idx] as usize;
            idx += 1;
            more_cnt = extra == 0xff;
            // Matches original_source: the count-extension loop adds into
            // `offset`, not `cnt` (`rtrstcmp.c` `uncompress_9`).
            offset += extra;
        }

        pos += offset;
        if pos >= size {
            break;
        }

        if comp {
            let mut remaining_pairs = (input.len() - idx) / 2;
            while remaining_pairs > 0 && pos < size {
                let rep_cnt = input[idx] as usize;
                let rep_val = input[idx + 1];
                idx += 2;
                remaining_pairs -= 1;

                let take = rep_cnt.min(size - pos);
                seed.pdata[pos..pos + take].fill(rep_val);
                pos += take;
            }
        } else {
            let take = cnt.min(input.len() - idx);
            let repl_start = idx;
            idx += take;
            let take2 = take.min(size - pos);
            seed.pdata[pos..pos + take2].copy_from_slice(&input[repl_start..repl_start + take2]);
            pos += take2;
        }
    }

    seed.is_blank = was_blank && input.is_empty();
}

/// One unit of adaptive-compression work (§4.1 mode 5). `Apply` carries the
/// slice of `input` that is the sub-mode's own payload; the caller decodes
/// it with the matching `CompressionMode` and emits one row.
#[derive(Debug, Clone, Copy)]
pub enum AdaptiveOp<'a> {
    Apply { mode: u8, data: &'a [u8] },
    SkipRows(usize),
    RepeatRows(usize),
}

/// Splits an adaptive-compression payload into its sequence of commands.
/// Each command is `(cmd, param_hi, param_lo)`; `Apply` commands are
/// immediately followed, in the same buffer, by `param` bytes of sub-mode
/// payload.
pub fn parse_adaptive(input: &[u8]) -> PclResult<Vec<AdaptiveOp<'_>>> {
    let mut ops = Vec::new();
    let mut idx = 0usize;

    while idx + 3 <= input.len() {
        let cmd = input[idx];
        let param = ((input[idx + 1] as usize) << 8) | input[idx + 2] as usize;
        idx += 3;

        match cmd {
            0..=3 => {
                let take = param.min(input.len() - idx);
                ops.push(AdaptiveOp::Apply {
                    mode: cmd,
                    data: &input[idx..idx + take],
                });
                idx += take;
            }
            4 => ops.push(AdaptiveOp::SkipRows(param)),
            5 => ops.push(AdaptiveOp::RepeatRows(param)),
            other => {
                return Err(PclError::invalid(format!(
                    "unsupported adaptive compression sub-command {other}"
                )))
            }
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uncompressed_zero_fills_tail_unless_already_blank() {
        let mut seed = SeedRow::new(5);
        seed.is_blank = false;
        seed.pdata = vec![9, 9, 9, 9, 9];
        decode(CompressionMode::Uncompressed, &mut seed, &[1, 2]).unwrap();
        assert_eq!(seed.pdata, vec![1, 2, 0, 0, 0]);
    }

    #[test]
    fn uncompressed_empty_input_marks_blank() {
        let mut seed = SeedRow::new(4);
        decode(CompressionMode::Uncompressed, &mut seed, &[]).unwrap();
        assert!(seed.is_blank);
    }

    #[test]
    fn run_length_decode_matches_scenario_4() {
        let mut seed = SeedRow::new(10);
        decode(CompressionMode::RunLength, &mut seed, &[0x03, 0xAA, 0x01, 0x55]).unwrap();
        assert_eq!(
            seed.pdata,
            vec![0xAA, 0xAA, 0xAA, 0xAA, 0x55, 0x55, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn run_length_odd_trailing_byte_is_ignored() {
        let mut seed = SeedRow::new(4);
        decode(CompressionMode::RunLength, &mut seed, &[0x00, 0x11, 0x22]).unwrap();
        assert_eq!(seed.pdata, vec![0x11, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn packbits_decode_matches_scenario_5() {
        let mut seed = SeedRow::new(8);
        decode(
            CompressionMode::Packbits,
            &mut seed,
            &[0xFE, 0xAA, 0x02, 0x10, 0x20, 0x30],
        )
        .unwrap();
        assert_eq!(seed.pdata, vec![0xAA, 0xAA, 0xAA, 0x10, 0x20, 0x30, 0x00, 0x00]);
    }

    #[test]
    fn packbits_no_op_byte_is_skipped() {
        let mut seed = SeedRow::new(4);
        decode(CompressionMode::Packbits, &mut seed, &[128, 0x01, 0x02]).unwrap();
        assert_eq!(seed.pdata, vec![0x01, 0x02, 0, 0]);
    }

    #[test]
    fn delta_row_round_trips_from_matching_seed() {
        let mut seed = SeedRow::new(6);
        seed.pdata = vec![1, 2, 3, 4, 5, 6];
        seed.is_blank = false;
        // control byte: cnt-1 = 1 (2 bytes), offset = 2
        let control = (1u8 << 5) | 2;
        decode(CompressionMode::DeltaRow, &mut seed, &[control, 0xAA, 0xBB]).unwrap();
        assert_eq!(seed.pdata, vec![1, 2, 0xAA, 0xBB, 5, 6]);
    }

    #[test]
    fn delta_row_extends_offset_past_0x1f() {
        let mut seed = SeedRow::new(40);
        seed.is_blank = false;
        // offset field = 0x1f, extension byte 10 -> offset = 0x1f + 10
        let control = (0u8 << 5) | 0x1f;
        decode(CompressionMode::DeltaRow, &mut seed, &[control, 10, 0x42]).unwrap();
        assert_eq!(seed.pdata[0x1f + 10], 0x42);
    }

    #[test]
    fn modified_delta_row_uncompressed_packing() {
        let mut seed = SeedRow::new(10);
        seed.is_blank = false;
        // uncompressed packing: high bit clear, offset=(v>>3)&0xf, cnt=(v&7)+1
        let control = (1u8 << 3) | 0x01; // offset=1, cnt=2
        decode(
            CompressionMode::ModifiedDeltaRow,
            &mut seed,
            &[control, 0x11, 0x22],
        )
        .unwrap();
        assert_eq!(&seed.pdata[1..3], &[0x11, 0x22]);
    }

    #[test]
    fn modified_delta_row_compressed_packing_uses_repeat_pairs() {
        let mut seed = SeedRow::new(10);
        seed.is_blank = false;
        let control = 0x80; // compressed packing, offset=0, cnt field unused for comp
        decode(
            CompressionMode::ModifiedDeltaRow,
            &mut seed,
            &[control, 0x03, 0x7F],
        )
        .unwrap();
        assert_eq!(&seed.pdata[0..3], &[0x7F, 0x7F, 0x7F]);
    }

    #[test]
    fn adaptive_mode_rejected_through_direct_decode() {
        let mut seed = SeedRow::new(4);
        assert!(decode(CompressionMode::Adaptive, &mut seed, &[]).is_err());
    }

    #[test]
    fn adaptive_skip_then_apply_matches_scenario_6() {
        let skip = parse_adaptive(&[0x04, 0x00, 0x03]).unwrap();
        assert!(matches!(skip[0], AdaptiveOp::SkipRows(3)));

        let apply = parse_adaptive(&[0x00, 0x00, 0x05, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]).unwrap();
        match apply[0] {
            AdaptiveOp::Apply { mode, data } => {
                assert_eq!(mode, 0);
                assert_eq!(data, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
            }
            _ => panic!("expected Apply"),
        }
    }

    #[test]
    fn unknown_compression_mode_is_invalid_parameters() {
        assert!(CompressionMode::from_u8(4).is_err());
    }
}
