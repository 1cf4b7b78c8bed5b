use std::path::PathBuf;

use log::debug;
use vtkhdf_array::{DataObject, DataSet};
use vtkhdf_container::Group;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

use super::VtkHdfWriter;
use super::leaf::{LeafWriter, PartLink, Piece};
use crate::{PieceLayout, WriteOptions, file_name, part_file_path};

/// A leaf whose pieces are stored inline, or each in a sibling file linked from the leaf.
#[derive(Debug)]
pub(crate) struct PartitionedLeaf {
    leaf: LeafWriter,
    /// The path the part files are named after
    base: PathBuf,
    options: WriteOptions,
    parts: Vec<VtkHdfWriter>,
}

impl PartitionedLeaf {
    pub(crate) fn new(group: Group, base: PathBuf, options: WriteOptions) -> Self {
        Self {
            leaf: LeafWriter::new(group, options.compression()),
            base,
            options,
            parts: Vec::new(),
        }
    }

    pub(crate) fn write(&mut self, step: Option<(usize, f64)>, pieces: &[DataSet]) -> VtkHdfResult<()> {
        if !self.options.use_external_partitions() {
            let pieces = pieces.iter().map(Piece::inline).collect::<Vec<_>>();
            return self.leaf.write(step, &pieces);
        }

        if !self.leaf.is_started() {
            let options = self.options.for_siblings();
            self.parts = (0..pieces.len())
                .map(|p| VtkHdfWriter::create(part_file_path(&self.base, p), options.clone()))
                .collect::<VtkHdfResult<Vec<_>>>()?;
        } else if self.parts.len() != pieces.len() {
            vtkhdf_bail!(
                "{} pieces given where earlier steps had {}, external pieces cannot change count",
                pieces.len(),
                self.parts.len()
            );
        }

        let mut links = Vec::with_capacity(pieces.len());
        for (part, piece) in self.parts.iter_mut().zip(pieces) {
            let object = DataObject::from(piece.clone());
            match step {
                Some((index, time)) => part.write_step(index, time, &object)?,
                None => part.write(&object)?,
            }
            let layout = PieceLayout::resolve(
                &part.root_group()?,
                piece.kind(),
                step.map(|(index, _)| index),
                0,
            )?;
            links.push(PartLink {
                file: file_name(part.path()),
                layout,
            });
        }
        debug!("linking {} pieces from {}", links.len(), self.base.display());

        let pieces = pieces
            .iter()
            .zip(&links)
            .map(|(data, link)| Piece {
                data,
                link: Some(link),
            })
            .collect::<Vec<_>>();
        self.leaf.write(step, &pieces)
    }

    pub(crate) fn finish(self) -> VtkHdfResult<()> {
        for part in self.parts {
            part.finish()?;
        }
        Ok(())
    }
}
