use std::fmt::{Display, Formatter};
use std::str::FromStr;

use vtkhdf_array::{DataObject, DataSetKind};
use vtkhdf_error::{VtkHdfError, vtkhdf_bail, vtkhdf_err};

/// The `Type` recorded on the root group of a file, or on a block group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataSetType {
    ImageData,
    PolyData,
    UnstructuredGrid,
    OverlappingAMR,
    PartitionedDataSetCollection,
    MultiBlockDataSet,
}

impl DataSetType {
    pub const fn name(self) -> &'static str {
        match self {
            DataSetType::ImageData => "ImageData",
            DataSetType::PolyData => "PolyData",
            DataSetType::UnstructuredGrid => "UnstructuredGrid",
            DataSetType::OverlappingAMR => "OverlappingAMR",
            DataSetType::PartitionedDataSetCollection => "PartitionedDataSetCollection",
            DataSetType::MultiBlockDataSet => "MultiBlockDataSet",
        }
    }

    /// Whether blocks of this type are described by an assembly.
    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            DataSetType::PartitionedDataSetCollection | DataSetType::MultiBlockDataSet
        )
    }

    /// The leaf kind stored under this type, if it is a leaf type this crate reads.
    pub const fn leaf_kind(self) -> Option<DataSetKind> {
        match self {
            DataSetType::ImageData => Some(DataSetKind::ImageData),
            DataSetType::PolyData => Some(DataSetKind::PolyData),
            DataSetType::UnstructuredGrid => Some(DataSetKind::UnstructuredGrid),
            DataSetType::OverlappingAMR
            | DataSetType::PartitionedDataSetCollection
            | DataSetType::MultiBlockDataSet => None,
        }
    }

    /// The type a data object is recorded as.
    ///
    /// A partitioned dataset is recorded as the kind of its pieces, which must agree. An empty one
    /// is recorded as an unstructured grid without pieces.
    pub fn of(object: &DataObject) -> Result<Self, VtkHdfError> {
        Ok(match object {
            DataObject::ImageData(_) => DataSetType::ImageData,
            DataObject::PolyData(_) => DataSetType::PolyData,
            DataObject::UnstructuredGrid(_) => DataSetType::UnstructuredGrid,
            DataObject::PartitionedDataSetCollection(_) => {
                DataSetType::PartitionedDataSetCollection
            }
            DataObject::MultiBlockDataSet(_) => DataSetType::MultiBlockDataSet,
            DataObject::PartitionedDataSet(pds) => {
                let mut kinds = pds.partitions().iter().map(|p| p.kind());
                let first = kinds.next().unwrap_or(DataSetKind::UnstructuredGrid);
                if let Some(other) = kinds.find(|k| *k != first) {
                    vtkhdf_bail!("partitions of kinds {first} and {other} cannot share a file");
                }
                if first == DataSetKind::ImageData && pds.len() > 1 {
                    vtkhdf_bail!("image data cannot be split into {} partitions", pds.len());
                }
                first.into()
            }
        })
    }
}

impl From<DataSetKind> for DataSetType {
    fn from(kind: DataSetKind) -> Self {
        match kind {
            DataSetKind::ImageData => DataSetType::ImageData,
            DataSetKind::PolyData => DataSetType::PolyData,
            DataSetKind::UnstructuredGrid => DataSetType::UnstructuredGrid,
        }
    }
}

impl Display for DataSetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DataSetType {
    type Err = VtkHdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ImageData" => DataSetType::ImageData,
            "PolyData" => DataSetType::PolyData,
            "UnstructuredGrid" => DataSetType::UnstructuredGrid,
            "OverlappingAMR" => DataSetType::OverlappingAMR,
            "PartitionedDataSetCollection" => DataSetType::PartitionedDataSetCollection,
            "MultiBlockDataSet" => DataSetType::MultiBlockDataSet,
            other => return Err(vtkhdf_err!(FormatError: "unknown dataset type '{other}'")),
        })
    }
}
