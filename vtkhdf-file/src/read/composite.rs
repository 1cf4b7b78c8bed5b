//! Reading composite trees back by walking their `Assembly` group.

use log::debug;
use vtkhdf_array::{
    DataObject, DataSet, MultiBlockDataSet, MultiBlockNode, PartitionedDataSet,
    PartitionedDataSetCollection,
};
use vtkhdf_container::{ContainerFile, Group, Mode};
use vtkhdf_error::{VtkHdfError, VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use super::leaf::{is_partitioned, read_leaf};
use crate::{DataSetType, ReadOptions, get_attribute_ints, get_attribute_str, get_number_of_steps};

/// Reads the composite tree below `root`.
pub(crate) fn read_composite(
    root: &Group,
    data_type: DataSetType,
    options: &ReadOptions,
) -> VtkHdfResult<DataObject> {
    let steps = get_number_of_steps(root)?;
    if let Some(step) = options.step() {
        if steps > 0 && step >= steps {
            vtkhdf_bail!(RangeError: "step {step} requested from a series of {steps} steps");
        }
    }
    let assembly = root.open_group("Assembly")?;
    let mut reader = AssemblyReader {
        root,
        options,
        next_index: 0,
    };
    match data_type {
        DataSetType::PartitionedDataSetCollection => {
            let mut collection = PartitionedDataSetCollection::new();
            for name in assembly.children()? {
                let node = assembly.open_group(&name)?;
                if !node.has_attribute("Index")? {
                    vtkhdf_bail!(FormatError: "collection block {name} is not a leaf");
                }
                let (pieces, _) = reader.read_leaf(&node)?;
                collection.push(name, PartitionedDataSet::new(pieces));
            }
            Ok(collection.into())
        }
        DataSetType::MultiBlockDataSet => Ok(reader.read_tree(&assembly)?.into()),
        other => Err(vtkhdf_err!("a {other} is not a composite type")),
    }
}

struct AssemblyReader<'a> {
    root: &'a Group,
    options: &'a ReadOptions,
    /// The depth-first ordinal the next leaf must carry
    next_index: usize,
}

impl AssemblyReader<'_> {
    fn read_tree(&mut self, group: &Group) -> VtkHdfResult<MultiBlockDataSet> {
        let mut tree = MultiBlockDataSet::new();
        for name in group.children()? {
            let node = group.open_group(&name)?;
            if !node.has_attribute("Index")? {
                let subtree = self.read_tree(&node)?;
                tree.push(name, MultiBlockNode::MultiBlock(subtree));
                continue;
            }
            let (mut pieces, partitioned) = self.read_leaf(&node)?;
            let block = if pieces.len() == 1 && (!partitioned || self.options.merge_parts()) {
                pieces.pop().map(MultiBlockNode::DataSet)
            } else {
                None
            };
            tree.push(
                name,
                block.unwrap_or_else(|| MultiBlockNode::Partitioned(PartitionedDataSet::new(pieces))),
            );
        }
        Ok(tree)
    }

    /// Reads the pieces of the leaf an assembly node refers to, and whether they were written
    /// as a partitioned dataset.
    fn read_leaf(&mut self, node: &Group) -> VtkHdfResult<(Vec<DataSet>, bool)> {
        let index = get_attribute_ints(node, "Index", 1)?[0];
        if usize::try_from(index).ok() != Some(self.next_index) {
            vtkhdf_bail!(
                FormatError: "{} carries index {index} where leaf {} was expected",
                node.path(),
                self.next_index
            );
        }
        self.next_index += 1;

        let path = get_attribute_str(node, "Path")?;
        let group = if node.has_attribute("File")? {
            let file = open_sibling(self.root.file(), &get_attribute_str(node, "File")?)?;
            file.group(&path)
        } else {
            self.root.file().group(&path)
        }
        .map_err(|e| {
            vtkhdf_err!(ReferenceError: "{} refers to {path}, which cannot be opened: {e}", node.path())
        })?;
        let options = self.options;
        let pieces = read_leaf(&group, options, |pieces| options.pieces().clamp(pieces))?;
        Ok((pieces, is_partitioned(&group)?))
    }
}

/// Opens the sibling file `name` of `file`, which must exist.
fn open_sibling(file: &ContainerFile, name: &str) -> VtkHdfResult<ContainerFile> {
    let path = file.resolve_sibling(name);
    debug!("opening sibling {}", path.display());
    ContainerFile::open(&path, Mode::Read).map_err(|e| {
        if matches!(e.innermost(), VtkHdfError::IOError(..)) {
            vtkhdf_err!(ReferenceError: "the sibling {} cannot be opened: {e}", path.display())
        } else {
            e
        }
    })
}
