use std::path::PathBuf;

use crate::mesh::IndexBox;

/// Errors raised while building the layer or reading checkpoints.
///
/// All construction errors are configuration errors: they are detected before
/// any simulation work happens and there is no way to recover from them
/// without changing the inputs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "interior block {block:?} has {extent} cells along axis {axis}, but the layer is {ncell} cells thick. Consider using larger blocks (blocking factor) with PMLs"
    )]
    BlockTooSmall {
        block: IndexBox,
        axis: usize,
        extent: i64,
        ncell: i64,
    },

    #[error(
        "interior block {block:?} was classified as {category} for tile {tile:?} along axis {axis}, but doesn't overlap it"
    )]
    InvalidAdjacency {
        category: &'static str,
        tile: IndexBox,
        block: IndexBox,
        axis: usize,
    },

    #[error(
        "tile {tile:?} faces {count} interior blocks along axis {axis}. Gaps between blocks not wide enough?"
    )]
    AmbiguousDirectFace {
        tile: IndexBox,
        axis: usize,
        count: usize,
    },

    #[error("spectral solver selected, but no spectral solver backend was provided")]
    SpectralSolverUnavailable,

    #[error("checkpoint io error: {path}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid checkpoint header: {path}")]
    CheckpointHeader {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not decompress checkpoint: {path}")]
    CheckpointDecompress {
        path: PathBuf,
        #[source]
        source: lz4_flex::block::DecompressError,
    },

    #[error("checkpoint {path} doesn't match the allocated field: {reason}")]
    CheckpointMismatch { path: PathBuf, reason: String },
}
