//! Reading VTKHDF files back into data objects.

mod composite;
mod leaf;

use std::path::Path;

use log::debug;
pub use leaf::read_piece;
use vtkhdf_array::{DataObject, PartitionedDataSet};
use vtkhdf_container::{ContainerFile, Group, Hyperslab, Mode, NodeKind};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

use self::composite::read_composite;
use self::leaf::{is_partitioned, read_leaf, select_step};
use crate::root::open_root;
use crate::{DataSetType, ReadOptions, RootDescriptor, get_number_of_steps, number_of_pieces};

/// An open VTKHDF file.
///
/// ```no_run
/// use vtkhdf_file::{ReadOptions, VtkHdfFile};
///
/// let file = VtkHdfFile::open("series.vtkhdf")?;
/// for step in 0..file.number_of_steps()?.max(1) {
///     let mesh = file.read(&ReadOptions::default().with_step(step))?;
///     println!("step {step}: {mesh}");
/// }
/// # Ok::<(), vtkhdf_error::VtkHdfError>(())
/// ```
#[derive(Debug)]
pub struct VtkHdfFile {
    file: ContainerFile,
    root: Group,
    descriptor: RootDescriptor,
}

impl VtkHdfFile {
    pub fn open(path: impl AsRef<Path>) -> VtkHdfResult<Self> {
        let file = ContainerFile::open(path.as_ref(), Mode::Read)?;
        let (root, descriptor) = open_root(&file)?;
        let (major, minor) = descriptor.version();
        debug!(
            "opened {} holding a {} (version {major}.{minor})",
            path.as_ref().display(),
            descriptor.data_type()
        );
        Ok(Self {
            file,
            root,
            descriptor,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn data_type(&self) -> DataSetType {
        self.descriptor.data_type()
    }

    pub fn version(&self) -> (i64, i64) {
        self.descriptor.version()
    }

    /// The root group, for lower level access.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Number of time steps, zero when the file has none.
    pub fn number_of_steps(&self) -> VtkHdfResult<usize> {
        get_number_of_steps(&self.root)
    }

    /// The time value of every step.
    pub fn time_values(&self) -> VtkHdfResult<Vec<f64>> {
        if self.root.child_kind("Steps/Values")? != Some(NodeKind::Dataset) {
            return Ok(Vec::new());
        }
        let values = self.root.open_dataset("Steps/Values")?;
        values.read_values::<f64>(&Hyperslab::all(&values.dims()?))
    }

    /// Number of pieces the leaf holds at `step`; ignored when the file has no steps.
    pub fn number_of_pieces(&self, step: usize) -> VtkHdfResult<usize> {
        let Some(kind) = self.data_type().leaf_kind() else {
            vtkhdf_bail!("a {} has no pieces of its own", self.data_type());
        };
        let step = select_step(&self.root, &ReadOptions::default().with_step(step))?;
        number_of_pieces(&self.root, kind, step)
    }

    /// Reads the content of the file.
    ///
    /// A leaf written from a partitioned dataset comes back as one, unless
    /// [`ReadOptions::with_merge_parts`] asks for the pieces to be merged. Any other leaf made of
    /// one piece comes back as that dataset.
    pub fn read(&self, options: &ReadOptions) -> VtkHdfResult<DataObject> {
        let data_type = self.data_type();
        if data_type.is_composite() {
            return read_composite(&self.root, data_type, options);
        }
        let partitioned = is_partitioned(&self.root)?;
        let mut pieces = read_leaf(&self.root, options, |pieces| options.pieces().resolve(pieces))?;
        if pieces.len() == 1 && (!partitioned || options.merge_parts()) {
            if let Some(piece) = pieces.pop() {
                return Ok(piece.into());
            }
        }
        Ok(PartitionedDataSet::new(pieces).into())
    }
}

/// Reads the file at `path`.
pub fn read(path: impl AsRef<Path>, options: &ReadOptions) -> VtkHdfResult<DataObject> {
    VtkHdfFile::open(path)?.read(options)
}
