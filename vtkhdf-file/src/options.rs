use std::ops::Range;

use vtkhdf_container::MAX_DEFLATE_LEVEL;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// Options of a [`VtkHdfWriter`](crate::VtkHdfWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriteOptions {
    use_external_partitions: bool,
    use_external_composite: bool,
    compression_level: u32,
    write_all_time_steps: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            use_external_partitions: false,
            use_external_composite: false,
            compression_level: 0,
            write_all_time_steps: true,
        }
    }
}

impl WriteOptions {
    /// Store every piece of a partitioned dataset in its own sibling file, referenced from the
    /// main file.
    pub fn with_external_partitions(mut self, external: bool) -> Self {
        self.use_external_partitions = external;
        self
    }

    /// Store every leaf of a composite dataset in its own sibling file.
    pub fn with_external_composite(mut self, external: bool) -> Self {
        self.use_external_composite = external;
        self
    }

    /// Deflate level of the data, from 0 (stored) to [`MAX_DEFLATE_LEVEL`].
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Whether a time series is written whole, or only its first step without a time index.
    pub fn with_write_all_time_steps(mut self, all: bool) -> Self {
        self.write_all_time_steps = all;
        self
    }

    pub fn use_external_partitions(&self) -> bool {
        self.use_external_partitions
    }

    pub fn use_external_composite(&self) -> bool {
        self.use_external_composite
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn write_all_time_steps(&self) -> bool {
        self.write_all_time_steps
    }

    /// The compression handed to the container, `None` when data is stored as is.
    pub(crate) fn compression(&self) -> Option<u32> {
        (self.compression_level > 0).then_some(self.compression_level)
    }

    /// Options of the writers of part files, which hold a single piece each.
    pub(crate) fn for_siblings(&self) -> Self {
        Self {
            use_external_partitions: false,
            use_external_composite: false,
            write_all_time_steps: true,
            ..self.clone()
        }
    }

    /// Options of the writers of external composite leaves.
    pub(crate) fn for_blocks(&self) -> Self {
        Self {
            use_external_composite: false,
            write_all_time_steps: true,
            ..self.clone()
        }
    }

    pub(crate) fn validate(&self) -> VtkHdfResult<()> {
        if self.compression_level > MAX_DEFLATE_LEVEL {
            vtkhdf_bail!(
                "compression level {} exceeds the maximum of {MAX_DEFLATE_LEVEL}",
                self.compression_level
            );
        }
        Ok(())
    }
}

/// Which pieces of a leaf are read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PieceSelection {
    #[default]
    All,
    /// The pieces with these indices
    Range(Range<usize>),
    /// The share of one of `ranks` readers: pieces `[rank * n / ranks, (rank + 1) * n / ranks)`
    Rank { rank: usize, ranks: usize },
}

impl PieceSelection {
    /// The indices selected out of `pieces` pieces.
    pub fn resolve(&self, pieces: usize) -> VtkHdfResult<Range<usize>> {
        match self {
            PieceSelection::All => Ok(0..pieces),
            PieceSelection::Range(range) => {
                if range.start > range.end || range.end > pieces {
                    vtkhdf_bail!(
                        RangeError: "pieces {}..{} are not within the {pieces} pieces",
                        range.start,
                        range.end
                    );
                }
                Ok(range.clone())
            }
            PieceSelection::Rank { rank, ranks } => {
                if *ranks == 0 || rank >= ranks {
                    vtkhdf_bail!("rank {rank} is not one of {ranks} ranks");
                }
                Ok(rank * pieces / ranks..(rank + 1) * pieces / ranks)
            }
        }
    }

    /// Like [`PieceSelection::resolve`], but a range is cut down to the pieces that exist.
    ///
    /// The leaves of a composite hold different numbers of pieces, so one range cannot fit all.
    pub fn clamp(&self, pieces: usize) -> VtkHdfResult<Range<usize>> {
        match self {
            PieceSelection::Range(range) => {
                Ok(range.start.min(pieces)..range.end.min(pieces).max(range.start.min(pieces)))
            }
            PieceSelection::All | PieceSelection::Rank { .. } => self.resolve(pieces),
        }
    }
}

/// Options of a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadOptions {
    step: Option<usize>,
    merge_parts: bool,
    pieces: PieceSelection,
}

impl ReadOptions {
    /// Read time step `step` instead of the first.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    /// Merge the pieces of a leaf into a single dataset instead of returning them partitioned.
    pub fn with_merge_parts(mut self, merge: bool) -> Self {
        self.merge_parts = merge;
        self
    }

    pub fn with_piece_range(mut self, range: Range<usize>) -> Self {
        self.pieces = PieceSelection::Range(range);
        self
    }

    /// Read the share of the pieces that belongs to `rank` out of `ranks` readers.
    pub fn with_piece(mut self, rank: usize, ranks: usize) -> Self {
        self.pieces = PieceSelection::Rank { rank, ranks };
        self
    }

    pub fn step(&self) -> Option<usize> {
        self.step
    }

    pub fn merge_parts(&self) -> bool {
        self.merge_parts
    }

    pub fn pieces(&self) -> &PieceSelection {
        &self.pieces
    }
}
