// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Synthesizes a conformant H.264 elementary stream that scrolls between two
//! still reference pictures.
//!
//! Given two externally-encoded reference pictures of identical dimensions,
//! this crate rewrites their slice headers so each becomes a long-term
//! reference frame, then synthesizes a sequence of P-frames that scroll from
//! one to the other using motion-vector-only inter prediction: no residual
//! is ever coded, so the only per-frame cost is a handful of motion vectors
//! and skip runs. A small table of intermediate long-term references
//! ("waypoints") is minted automatically whenever the scroll distance would
//! otherwise exceed the motion vector search range a hardware decoder
//! guarantees.
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(feature = "backtrace", feature(error_generic_member_access))]
#![deny(unsafe_code)]

#[cfg(not(feature = "std"))]
extern crate core as std;

extern crate alloc;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

mod golomb;

pub mod bitstream;
pub mod mv_predict;
pub mod nal;
pub mod orchestrator;
pub mod paramset;
pub mod slice_rewriter;
pub mod synthesizer;
pub mod waypoint;

pub use orchestrator::ScrollEncoder;

// Error type ----------------------

/// A particular kind of domain-level inconsistency that is not a bitstream
/// parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// The waypoint table is full; this scroll sequence needs more than
    /// [`waypoint::MAX_WAYPOINTS`] intermediate long-term references.
    WaypointTableFull,
    /// Reference A and reference B do not share the same coded dimensions.
    DimensionMismatch {
        width_a: u32,
        height_a: u32,
        width_b: u32,
        height_b: u32,
    },
}

/// An encoding error.
#[derive(Debug)]
pub enum Error {
    /// A bitstream did not have the shape this crate expects, either
    /// because it is malformed or because it uses a feature outside the
    /// subset this crate reads or writes.
    Parse {
        msg: &'static str,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
    /// A request was inconsistent with the state of the encode in progress.
    Domain {
        kind: DomainErrorKind,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
    #[cfg(feature = "std")]
    Io {
        source: std::io::Error,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl Error {
    pub(crate) fn parse(msg: &'static str) -> Self {
        Error::Parse {
            msg,
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn waypoint_table_full() -> Self {
        Error::Domain {
            kind: DomainErrorKind::WaypointTableFull,
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn dimension_mismatch(width_a: u32, height_a: u32, width_b: u32, height_b: u32) -> Self {
        Error::Domain {
            kind: DomainErrorKind::DimensionMismatch {
                width_a,
                height_a,
                width_b,
                height_b,
            },
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            source,
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io {
                source,
                #[cfg(feature = "backtrace")]
                    backtrace: _,
            } => Some(source),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            Error::Parse {
                msg,
                #[cfg(feature = "backtrace")]
                    backtrace: _,
            } => {
                write!(f, "malformed bitstream: {msg}")
            }
            Error::Domain {
                kind: DomainErrorKind::WaypointTableFull,
                #[cfg(feature = "backtrace")]
                    backtrace: _,
            } => {
                write!(f, "waypoint table is full, this scroll distance needs more long-term references than are available")
            }
            Error::Domain {
                kind:
                    DomainErrorKind::DimensionMismatch {
                        width_a,
                        height_a,
                        width_b,
                        height_b,
                    },
                #[cfg(feature = "backtrace")]
                    backtrace: _,
            } => {
                write!(
                    f,
                    "reference pictures differ in size: A is {width_a}x{height_a}, B is {width_b}x{height_b}"
                )
            }
            #[cfg(feature = "std")]
            Error::Io {
                source,
                #[cfg(feature = "backtrace")]
                    backtrace: _,
            } => {
                write!(f, "IO error: {source}")
            }
        }
    }
}

type Result<T> = core::result::Result<T, Error>;
