use thiserror::Error;

use crate::anchor::AnchorId;
use crate::link::LinkId;

/// Errors surfaced by the loader, the rewrite passes, and the emitter.
#[derive(Debug, Error)]
pub enum EnredoError {
    #[error("cannot read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed row: {text:?}")]
    MalformedRow { line: u64, text: String },

    #[error("line {line}: start > end")]
    StartAfterEnd { line: u64 },

    #[error("line {line}: invalid strand {value:?}")]
    BadStrand { line: u64, value: String },

    #[error("line {line}: unexpected anchor-pair orientation while deriving strand")]
    UnexpectedOrientation { line: u64 },

    #[error("invariant violation: split would leave link {link:?} empty")]
    EmptyLinkInvariant { link: LinkId },

    #[error("invariant violation: anchor {anchor:?} expected to be an endpoint of a matched link but was not found")]
    AnchorMatchInvariant { anchor: AnchorId },
}

pub type Result<T> = std::result::Result<T, EnredoError>;
