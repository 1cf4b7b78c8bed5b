//! Writing datasets and time series to VTKHDF files.

mod composite;
mod leaf;
mod parts;
mod temporal;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use log::debug;
pub(crate) use leaf::{LeafWriter, PartLink, Piece};
pub use temporal::*;
use vtkhdf_array::{DataObject, DataSet};
use vtkhdf_container::{ContainerFile, Group};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use self::composite::CompositeWriter;
use self::parts::PartitionedLeaf;
use crate::{
    DataSetType, PARTITIONED_ATTRIBUTE, VERSION, VTKHDF_ROOT_PATH, WriteOptions, set_attribute,
};

#[derive(Debug)]
enum Target {
    Leaf(PartitionedLeaf),
    Composite(CompositeWriter),
}

impl Target {
    fn finish(self) -> VtkHdfResult<()> {
        match self {
            Target::Leaf(leaf) => leaf.finish(),
            Target::Composite(composite) => composite.finish(),
        }
    }
}

/// The pieces of a leaf object.
fn leaf_pieces(object: &DataObject) -> VtkHdfResult<Cow<'_, [DataSet]>> {
    match object {
        DataObject::PartitionedDataSet(partitioned) => Ok(Cow::Borrowed(partitioned.partitions())),
        other => other
            .as_data_set()
            .map(|data| Cow::Owned(vec![data]))
            .ok_or_else(|| vtkhdf_err!("a {other} is not a leaf")),
    }
}

/// Writes one dataset, or a time series of datasets, to a new VTKHDF file.
///
/// The type of the file is fixed by the first object written. A time series must hand its steps
/// over in order, each with the same structure and array names.
///
/// ```no_run
/// use vtkhdf_array::{DataObject, UnstructuredGrid};
/// use vtkhdf_file::{VtkHdfWriter, WriteOptions};
///
/// let mut writer = VtkHdfWriter::create("series.vtkhdf", WriteOptions::default())?;
/// for (index, time) in [0.0, 0.5, 1.0].into_iter().enumerate() {
///     writer.write_step(index, time, &DataObject::from(UnstructuredGrid::default()))?;
/// }
/// writer.finish()?;
/// # Ok::<(), vtkhdf_error::VtkHdfError>(())
/// ```
#[derive(Debug)]
pub struct VtkHdfWriter {
    file: ContainerFile,
    path: PathBuf,
    options: WriteOptions,
    data_type: Option<DataSetType>,
    target: Option<Target>,
    steps: TemporalController,
}

impl VtkHdfWriter {
    /// Creates the file at `path`, replacing any file there.
    pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> VtkHdfResult<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = ContainerFile::create(&path)?;
        file.root()
            .create_group(VTKHDF_ROOT_PATH.trim_start_matches('/'))?;
        debug!("writing {}", path.display());
        Ok(Self {
            file,
            path,
            options,
            data_type: None,
            target: None,
            steps: TemporalController::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn temporal_state(&self) -> TemporalState {
        self.steps.state()
    }

    /// The type of the file, once something was written.
    pub fn data_type(&self) -> Option<DataSetType> {
        self.data_type
    }

    pub(crate) fn root_group(&self) -> VtkHdfResult<Group> {
        self.file.group(VTKHDF_ROOT_PATH)
    }

    /// Writes `object` as the whole content of a file without time steps.
    pub fn write(&mut self, object: &DataObject) -> VtkHdfResult<()> {
        if self.data_type.is_some() {
            vtkhdf_bail!(SequenceError: "{} already holds a dataset", self.path.display());
        }
        self.write_object(None, object)?;
        self.steps.finalize();
        self.file.flush()
    }

    /// Appends `object` as time step `index` at time `time`.
    ///
    /// Steps start at zero and are written in order. Without
    /// [`write_all_time_steps`](WriteOptions::with_write_all_time_steps), step zero is written
    /// as a file without time steps and later steps are skipped.
    pub fn write_step(&mut self, index: usize, time: f64, object: &DataObject) -> VtkHdfResult<()> {
        self.steps.check_step(index)?;
        if !self.options.write_all_time_steps() {
            if index == 0 {
                self.write_object(None, object)?;
                self.file.flush()?;
            } else {
                debug!("skipping step {index} of {}", self.path.display());
            }
            self.steps.commit_step();
            return Ok(());
        }
        self.write_object(Some((index, time)), object)?;
        self.steps.commit_step();
        self.file.flush()
    }

    fn write_object(&mut self, step: Option<(usize, f64)>, object: &DataObject) -> VtkHdfResult<()> {
        let data_type = DataSetType::of(object)?;
        if let Some(expected) = self.data_type {
            if expected != data_type {
                vtkhdf_bail!("cannot write a {data_type} to a file holding a {expected}");
            }
        }
        let mut target = match self.target.take() {
            Some(target) => target,
            None => self.start(data_type, matches!(object, DataObject::PartitionedDataSet(_)))?,
        };
        let written = match &mut target {
            Target::Leaf(leaf) => leaf.write(step, &leaf_pieces(object)?),
            Target::Composite(composite) => composite.write(step, object),
        };
        self.target = Some(target);
        self.data_type = Some(data_type);
        written
    }

    fn start(&self, data_type: DataSetType, partitioned: bool) -> VtkHdfResult<Target> {
        let root = self.root_group()?;
        set_attribute(&root, "Version", VERSION.to_vec())?;
        set_attribute(&root, "Type", data_type.name())?;
        if partitioned {
            set_attribute(&root, PARTITIONED_ATTRIBUTE, vec![1i64])?;
        }
        Ok(if data_type.is_composite() {
            Target::Composite(CompositeWriter::new(
                root,
                self.path.clone(),
                self.options.clone(),
            ))
        } else {
            Target::Leaf(PartitionedLeaf::new(
                root,
                self.path.clone(),
                self.options.clone(),
            ))
        })
    }

    /// Makes everything written so far durable without ending the series.
    pub fn flush(&self) -> VtkHdfResult<()> {
        self.file.flush()
    }

    /// Ends the series and closes the file and its siblings.
    pub fn finish(mut self) -> VtkHdfResult<()> {
        self.steps.finalize();
        if let Some(target) = self.target.take() {
            target.finish()?;
        }
        debug!("finished {}", self.path.display());
        self.file.close()
    }
}

/// Writes `object` to a new file at `path`.
pub fn write(path: impl AsRef<Path>, object: &DataObject, options: &WriteOptions) -> VtkHdfResult<()> {
    let mut writer = VtkHdfWriter::create(path, options.clone())?;
    writer.write(object)?;
    writer.finish()
}

/// Writes `steps`, pairs of time value and object, as a time series to a new file at `path`.
pub fn write_time_series(
    path: impl AsRef<Path>,
    steps: &[(f64, DataObject)],
    options: &WriteOptions,
) -> VtkHdfResult<()> {
    let mut writer = VtkHdfWriter::create(path, options.clone())?;
    for (index, (time, object)) in steps.iter().enumerate() {
        writer.write_step(index, *time, object)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use vtkhdf_array::{PartitionedDataSet, PolyData, UnstructuredGrid};
    use vtkhdf_error::VtkHdfError;

    use super::*;

    #[test]
    fn a_plain_file_takes_one_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            VtkHdfWriter::create(dir.path().join("once.vtkhdf"), WriteOptions::default()).unwrap();
        let grid = DataObject::from(UnstructuredGrid::default());
        writer.write(&grid).unwrap();
        assert_eq!(writer.data_type(), Some(DataSetType::UnstructuredGrid));
        assert!(matches!(
            writer.write(&grid).unwrap_err(),
            VtkHdfError::SequenceError(..)
        ));
        assert!(matches!(
            writer.write_step(0, 0.0, &grid).unwrap_err(),
            VtkHdfError::SequenceError(..)
        ));
        writer.finish().unwrap();
    }

    #[test]
    fn the_type_is_fixed_by_the_first_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            VtkHdfWriter::create(dir.path().join("typed.vtkhdf"), WriteOptions::default())
                .unwrap();
        writer
            .write_step(0, 0.0, &DataObject::from(PolyData::default()))
            .unwrap();
        assert!(
            writer
                .write_step(1, 1.0, &DataObject::from(UnstructuredGrid::default()))
                .is_err()
        );
        let partitioned = PartitionedDataSet::new(vec![PolyData::default().into()]);
        writer.write_step(1, 1.0, &partitioned.into()).unwrap();
        assert_eq!(writer.temporal_state(), TemporalState::StepsInProgress { next: 2 });
    }

    #[test]
    fn invalid_options_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            VtkHdfWriter::create(
                dir.path().join("bad.vtkhdf"),
                WriteOptions::default().with_compression_level(12)
            )
            .is_err()
        );
    }
}
