//! Composite datasets and the sum type over everything a file can hold.

use std::fmt::{Display, Formatter};

use crate::{DataSet, ImageData, PolyData, UnstructuredGrid};

/// An ordered list of pieces of one logical dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedDataSet {
    partitions: Vec<DataSet>,
}

impl PartitionedDataSet {
    pub fn new(partitions: Vec<DataSet>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[DataSet] {
        &self.partitions
    }

    pub fn into_partitions(self) -> Vec<DataSet> {
        self.partitions
    }

    pub fn push(&mut self, partition: DataSet) {
        self.partitions.push(partition);
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl FromIterator<DataSet> for PartitionedDataSet {
    fn from_iter<T: IntoIterator<Item = DataSet>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A flat, named list of partitioned datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedDataSetCollection {
    blocks: Vec<(String, PartitionedDataSet)>,
}

impl PartitionedDataSetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, name: impl Into<String>, block: PartitionedDataSet) -> Self {
        self.push(name, block);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, block: PartitionedDataSet) {
        self.blocks.push((name.into(), block));
    }

    pub fn blocks(&self) -> &[(String, PartitionedDataSet)] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// One child of a [`MultiBlockDataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum MultiBlockNode {
    /// A nested tree
    MultiBlock(MultiBlockDataSet),
    /// A single mesh
    DataSet(DataSet),
    /// A mesh split into more than one piece
    Partitioned(PartitionedDataSet),
}

/// A tree of named blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiBlockDataSet {
    blocks: Vec<(String, MultiBlockNode)>,
}

impl MultiBlockDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, name: impl Into<String>, block: MultiBlockNode) -> Self {
        self.push(name, block);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, block: MultiBlockNode) {
        self.blocks.push((name.into(), block));
    }

    pub fn blocks(&self) -> &[(String, MultiBlockNode)] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of leaves below this tree, counted depth-first.
    pub fn number_of_leaves(&self) -> usize {
        self.blocks
            .iter()
            .map(|(_, node)| match node {
                MultiBlockNode::MultiBlock(tree) => tree.number_of_leaves(),
                MultiBlockNode::DataSet(_) | MultiBlockNode::Partitioned(_) => 1,
            })
            .sum()
    }
}

/// Everything a VTKHDF file can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum DataObject {
    ImageData(ImageData),
    PolyData(PolyData),
    UnstructuredGrid(UnstructuredGrid),
    PartitionedDataSet(PartitionedDataSet),
    PartitionedDataSetCollection(PartitionedDataSetCollection),
    MultiBlockDataSet(MultiBlockDataSet),
}

impl DataObject {
    /// Returns the leaf dataset, if this is one.
    pub fn as_data_set(&self) -> Option<DataSet> {
        match self {
            DataObject::ImageData(d) => Some(DataSet::ImageData(d.clone())),
            DataObject::PolyData(d) => Some(DataSet::PolyData(d.clone())),
            DataObject::UnstructuredGrid(d) => Some(DataSet::UnstructuredGrid(d.clone())),
            DataObject::PartitionedDataSet(_)
            | DataObject::PartitionedDataSetCollection(_)
            | DataObject::MultiBlockDataSet(_) => None,
        }
    }

    /// Converts into a leaf dataset, handing the object back otherwise.
    pub fn into_data_set(self) -> Result<DataSet, Self> {
        match self {
            DataObject::ImageData(d) => Ok(DataSet::ImageData(d)),
            DataObject::PolyData(d) => Ok(DataSet::PolyData(d)),
            DataObject::UnstructuredGrid(d) => Ok(DataSet::UnstructuredGrid(d)),
            other => Err(other),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            DataObject::PartitionedDataSetCollection(_) | DataObject::MultiBlockDataSet(_)
        )
    }

    /// Name of the variant, as recorded in files.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataObject::ImageData(_) => "ImageData",
            DataObject::PolyData(_) => "PolyData",
            DataObject::UnstructuredGrid(_) => "UnstructuredGrid",
            DataObject::PartitionedDataSet(_) => "PartitionedDataSet",
            DataObject::PartitionedDataSetCollection(_) => "PartitionedDataSetCollection",
            DataObject::MultiBlockDataSet(_) => "MultiBlockDataSet",
        }
    }
}

impl Display for DataObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl From<DataSet> for DataObject {
    fn from(value: DataSet) -> Self {
        match value {
            DataSet::ImageData(d) => DataObject::ImageData(d),
            DataSet::PolyData(d) => DataObject::PolyData(d),
            DataSet::UnstructuredGrid(d) => DataObject::UnstructuredGrid(d),
        }
    }
}

impl From<ImageData> for DataObject {
    fn from(value: ImageData) -> Self {
        DataObject::ImageData(value)
    }
}

impl From<PolyData> for DataObject {
    fn from(value: PolyData) -> Self {
        DataObject::PolyData(value)
    }
}

impl From<UnstructuredGrid> for DataObject {
    fn from(value: UnstructuredGrid) -> Self {
        DataObject::UnstructuredGrid(value)
    }
}

impl From<PartitionedDataSet> for DataObject {
    fn from(value: PartitionedDataSet) -> Self {
        DataObject::PartitionedDataSet(value)
    }
}

impl From<PartitionedDataSetCollection> for DataObject {
    fn from(value: PartitionedDataSetCollection) -> Self {
        DataObject::PartitionedDataSetCollection(value)
    }
}

impl From<MultiBlockDataSet> for DataObject {
    fn from(value: MultiBlockDataSet) -> Self {
        DataObject::MultiBlockDataSet(value)
    }
}
