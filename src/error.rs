//! Error kinds for the color / pattern / raster core (spec §7).

use std::fmt;

/// The five error kinds named in §7. `Unimplemented` is caught at component
/// boundaries and never actually propagates out of a `do_*` entry point; it
/// exists here so internal helpers have somewhere to return it from before
/// the calling component decides to swallow it.
#[derive(Debug, Clone, PartialEq)]
pub enum PclError {
    /// Argument outside the legal range: bad CID length, inconsistent
    /// pattern header, palette index beyond palette size, illuminant with
    /// `y <= 0`, etc.
    InvalidParameters(String),

    /// Command issued in a forbidden state, e.g. adaptive compression used
    /// from `TransferPlane` rather than `TransferRow`.
    ProtocolError(String),

    /// Allocation failed (cache growth, seed row allocation, ...).
    OutOfMemory,

    /// Syntactically accepted but not acted upon by this core. Never
    /// escapes a component's public entry points.
    Unimplemented(&'static str),

    /// Internal invariant violation, e.g. a cache lookup that misses
    /// immediately after the matching insert.
    Fatal(String),
}

impl PclError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PclError::InvalidParameters(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        PclError::ProtocolError(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        PclError::Fatal(msg.into())
    }

    /// Range-class errors (`InvalidParameters`, `ProtocolError`) are
    /// advisory per §7: the parser's default policy is to continue with
    /// the next command. `OutOfMemory` and `Fatal` abort the page.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            PclError::InvalidParameters(_) | PclError::ProtocolError(_)
        )
    }
}

impl fmt::Display for PclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PclError::InvalidParameters(msg) => write!(f, "invalid parameters: {msg}"),
            PclError::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            PclError::OutOfMemory => write!(f, "out of memory"),
            PclError::Unimplemented(what) => write!(f, "unimplemented: {what}"),
            PclError::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for PclError {}

pub type PclResult<T> = Result<T, PclError>;
