pub mod color_space;
pub mod foreground;
pub mod palette;

pub use color_space::{Cid, CidParams, ColorSpace, ColorSpaceKind, PixelEncoding};
pub use foreground::Foreground;
pub use palette::{ControlOutcome, Palette, PaletteControlOp, PaletteStore};
