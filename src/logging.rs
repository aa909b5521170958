//! Thin `env_logger` wrapper (§3.2), generalizing the one-line
//! `env_logger::init()` call this crate's teacher uses in `render/wgpu/mod.rs`
//! to every component here: `trace!`/`debug!` on state transitions, `warn!`
//! on advisory errors, `error!` on fatal ones.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the global logger from `RUST_LOG`, once. Safe to call more
/// than once (embedders and this crate's own tests both call it).
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();
    });
}
