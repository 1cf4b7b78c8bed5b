//! Writing composite trees: an `Assembly` group mirrors the tree, and every leaf is written to
//! its own `Block<n>` group or sibling file, numbered depth-first.

use std::borrow::Cow;
use std::path::PathBuf;

use itertools::Itertools;
use log::debug;
use vtkhdf_array::{DataObject, DataSet, MultiBlockDataSet, MultiBlockNode, PartitionedDataSet};
use vtkhdf_container::Group;
use vtkhdf_dtype::{NativeType, to_index};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use super::VtkHdfWriter;
use super::parts::PartitionedLeaf;
use crate::{
    PARTITIONED_ATTRIBUTE, VTKHDF_ROOT_PATH, WriteOptions, block_file_path, file_name,
    require_dataset, set_attribute,
};

/// A leaf of a composite tree with its pieces.
#[derive(Debug)]
struct FlatLeaf<'a> {
    pieces: Cow<'a, [DataSet]>,
    /// Whether the leaf is a plain dataset rather than a partitioned one
    single: bool,
}

impl FlatLeaf<'_> {
    fn object(&self) -> DataObject {
        match self.pieces.as_ref() {
            [piece] if self.single => piece.clone().into(),
            pieces => PartitionedDataSet::new(pieces.to_vec()).into(),
        }
    }
}

#[derive(Debug)]
enum AssemblyEntry<'a> {
    Node(Vec<&'a str>),
    Leaf(Vec<&'a str>, FlatLeaf<'a>),
}

impl AssemblyEntry<'_> {
    /// What must stay the same across steps.
    fn signature(&self) -> String {
        match self {
            AssemblyEntry::Node(path) => format!("{}/", path.join("/")),
            AssemblyEntry::Leaf(path, _) => path.join("/"),
        }
    }
}

/// The entries of a composite tree, depth-first with every node before its children.
fn flatten(object: &DataObject) -> VtkHdfResult<Vec<AssemblyEntry<'_>>> {
    match object {
        DataObject::PartitionedDataSetCollection(collection) => Ok(collection
            .blocks()
            .iter()
            .map(|(name, block)| {
                AssemblyEntry::Leaf(
                    vec![name.as_str()],
                    FlatLeaf {
                        pieces: Cow::Borrowed(block.partitions()),
                        single: false,
                    },
                )
            })
            .collect()),
        DataObject::MultiBlockDataSet(tree) => {
            let mut entries = Vec::new();
            flatten_tree(tree, &[], &mut entries);
            Ok(entries)
        }
        other => Err(vtkhdf_err!("a {other} is not a composite dataset")),
    }
}

fn flatten_tree<'a>(tree: &'a MultiBlockDataSet, parent: &[&'a str], entries: &mut Vec<AssemblyEntry<'a>>) {
    for (name, node) in tree.blocks() {
        let mut path = parent.to_vec();
        path.push(name.as_str());
        match node {
            MultiBlockNode::MultiBlock(subtree) => {
                entries.push(AssemblyEntry::Node(path.clone()));
                flatten_tree(subtree, &path, entries);
            }
            MultiBlockNode::DataSet(data) => entries.push(AssemblyEntry::Leaf(
                path,
                FlatLeaf {
                    pieces: Cow::Borrowed(std::slice::from_ref(data)),
                    single: true,
                },
            )),
            MultiBlockNode::Partitioned(partitioned) => entries.push(AssemblyEntry::Leaf(
                path,
                FlatLeaf {
                    pieces: Cow::Borrowed(partitioned.partitions()),
                    single: false,
                },
            )),
        }
    }
}

/// Creates the assembly group at `path`, whose parents exist already.
fn create_node(assembly: &Group, path: &[&str]) -> VtkHdfResult<Group> {
    let (name, parents) = path
        .split_last()
        .ok_or_else(|| vtkhdf_err!("empty assembly path"))?;
    assembly.open_group(&parents.join("/"))?.create_group(name)
}

#[derive(Debug)]
enum BlockSink {
    Inline(PartitionedLeaf),
    External(VtkHdfWriter),
}

impl BlockSink {
    fn write(&mut self, step: Option<(usize, f64)>, leaf: &FlatLeaf<'_>) -> VtkHdfResult<()> {
        match self {
            BlockSink::Inline(writer) => writer.write(step, &leaf.pieces),
            BlockSink::External(writer) => match step {
                Some((index, time)) => writer.write_step(index, time, &leaf.object()),
                None => writer.write(&leaf.object()),
            },
        }
    }

    fn finish(self) -> VtkHdfResult<()> {
        match self {
            BlockSink::Inline(writer) => writer.finish(),
            BlockSink::External(writer) => writer.finish(),
        }
    }
}

/// Writes a partitioned dataset collection or a multiblock tree below the root group.
#[derive(Debug)]
pub(crate) struct CompositeWriter {
    root: Group,
    path: PathBuf,
    options: WriteOptions,
    structure: Option<Vec<String>>,
    blocks: Vec<BlockSink>,
}

impl CompositeWriter {
    pub(crate) fn new(root: Group, path: PathBuf, options: WriteOptions) -> Self {
        Self {
            root,
            path,
            options,
            structure: None,
            blocks: Vec::new(),
        }
    }

    pub(crate) fn write(&mut self, step: Option<(usize, f64)>, object: &DataObject) -> VtkHdfResult<()> {
        let entries = flatten(object)?;
        let structure = entries.iter().map(AssemblyEntry::signature).collect::<Vec<_>>();
        match &self.structure {
            None => {
                self.start(&entries, step.is_some())?;
                self.structure = Some(structure);
            }
            Some(existing) if *existing != structure => vtkhdf_bail!(
                "the composite tree changed from [{}] to [{}]",
                existing.join(", "),
                structure.join(", ")
            ),
            Some(_) => {}
        }

        let leaves = entries.iter().filter_map(|entry| match entry {
            AssemblyEntry::Leaf(_, leaf) => Some(leaf),
            AssemblyEntry::Node(_) => None,
        });
        for (ordinal, (block, leaf)) in self.blocks.iter_mut().zip(leaves).enumerate() {
            block
                .write(step, leaf)
                .map_err(|e| e.with_context(format!("writing block {ordinal}")))?;
        }

        if let Some((index, time)) = step {
            let steps = self.root.open_group("Steps")?;
            require_dataset(&steps, "Values", NativeType::Double, &[], None)?.append_values(&[time])?;
            set_attribute(&steps, "NSteps", vec![to_index(index + 1)?])?;
        }
        Ok(())
    }

    fn start(&mut self, entries: &[AssemblyEntry<'_>], temporal: bool) -> VtkHdfResult<()> {
        let assembly = self.root.create_group("Assembly")?;
        for entry in entries {
            match entry {
                AssemblyEntry::Node(path) => {
                    create_node(&assembly, path)?;
                }
                AssemblyEntry::Leaf(path, leaf) => {
                    let node = create_node(&assembly, path)?;
                    let block = self.start_block(&node, self.blocks.len(), !leaf.single)?;
                    self.blocks.push(block);
                }
            }
        }
        debug!(
            "assembly of {} leaves: {}",
            self.blocks.len(),
            entries.iter().map(AssemblyEntry::signature).join(", ")
        );

        if temporal {
            let steps = self.root.create_group("Steps")?;
            set_attribute(&steps, "NSteps", vec![0i64])?;
            require_dataset(&steps, "Values", NativeType::Double, &[], None)?;
        }
        Ok(())
    }

    fn start_block(&self, node: &Group, ordinal: usize, partitioned: bool) -> VtkHdfResult<BlockSink> {
        set_attribute(node, "Index", vec![to_index(ordinal)?])?;
        let sibling = block_file_path(&self.path, ordinal);
        if self.options.use_external_composite() {
            set_attribute(node, "File", file_name(&sibling))?;
            set_attribute(node, "Path", VTKHDF_ROOT_PATH)?;
            return Ok(BlockSink::External(VtkHdfWriter::create(
                &sibling,
                self.options.for_blocks(),
            )?));
        }

        let name = format!("Block{ordinal}");
        let group = self.root.create_group(&name)?;
        if partitioned {
            set_attribute(&group, PARTITIONED_ATTRIBUTE, vec![1i64])?;
        }
        set_attribute(node, "Path", format!("{VTKHDF_ROOT_PATH}/{name}"))?;
        Ok(BlockSink::Inline(PartitionedLeaf::new(
            group,
            sibling,
            self.options.clone(),
        )))
    }

    pub(crate) fn finish(self) -> VtkHdfResult<()> {
        for block in self.blocks {
            block.finish()?;
        }
        Ok(())
    }
}
