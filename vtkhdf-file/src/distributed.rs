//! Writing one dataset from several ranks.
//!
//! Every rank writes its piece to its own part file. Rank 0 then builds the main file out of the
//! parts, linking to their data when pieces are external and copying it otherwise. Ranks meet at
//! a barrier before and after every step, so a reader never sees a step half written.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;
use vtkhdf_array::{DataObject, DataSet};
use vtkhdf_container::{ContainerFile, Group, Mode};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::root::open_root;
use crate::write::{LeafWriter, PartLink, Piece};
use crate::{
    Controller, PieceLayout, TemporalController, VERSION, VTKHDF_ROOT_PATH, VtkHdfWriter,
    WriteOptions, file_name, get_number_of_steps, part_file_path, read_piece, set_attribute,
};

/// The main file, built by rank 0.
#[derive(Debug)]
struct MainFile {
    file: ContainerFile,
    leaf: LeafWriter,
}

impl MainFile {
    fn create(path: &Path, options: &WriteOptions) -> VtkHdfResult<Self> {
        let file = ContainerFile::create(path)?;
        let root = file
            .root()
            .create_group(VTKHDF_ROOT_PATH.trim_start_matches('/'))?;
        set_attribute(&root, "Version", VERSION.to_vec())?;
        Ok(Self {
            file,
            leaf: LeafWriter::new(root, options.compression()),
        })
    }
}

/// A part file as rank 0 sees it.
struct Part {
    path: PathBuf,
    root: Group,
    data: DataSet,
}

/// Writes the piece of one rank of a dataset split over `controller`'s ranks.
///
/// Every rank calls the same methods in the same order; each call returns once all ranks are
/// done with it.
pub struct DistributedWriter<C: Controller> {
    controller: C,
    path: PathBuf,
    options: WriteOptions,
    part: Option<VtkHdfWriter>,
    main: Option<MainFile>,
    steps: TemporalController,
}

impl<C: Controller> DistributedWriter<C> {
    pub fn new(controller: C, path: impl AsRef<Path>, options: WriteOptions) -> VtkHdfResult<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let part = VtkHdfWriter::create(
            part_file_path(&path, controller.rank()),
            options.for_siblings(),
        )?;
        Ok(Self {
            controller,
            path,
            options,
            part: Some(part),
            main: None,
            steps: TemporalController::default(),
        })
    }

    pub fn rank(&self) -> usize {
        self.controller.rank()
    }

    /// Path of the part file of this rank.
    pub fn part_path(&self) -> PathBuf {
        part_file_path(&self.path, self.controller.rank())
    }

    fn part(&mut self) -> VtkHdfResult<&mut VtkHdfWriter> {
        self.part
            .as_mut()
            .ok_or_else(|| vtkhdf_err!(SequenceError: "the writer of {} is finished", self.path.display()))
    }

    /// Writes this rank's piece of a dataset without time steps.
    pub fn write(&mut self, data: &DataSet) -> VtkHdfResult<()> {
        self.steps.check_step(0)?;
        let written = self
            .part()
            .and_then(|part| part.write(&DataObject::from(data.clone())));
        self.gather(None, written)?;
        self.steps.finalize();
        Ok(())
    }

    /// Writes this rank's piece of time step `index`.
    pub fn write_step(&mut self, index: usize, time: f64, data: &DataSet) -> VtkHdfResult<()> {
        self.steps.check_step(index)?;
        let step = match (self.options.write_all_time_steps(), index) {
            (true, _) => Some((index, time)),
            (false, 0) => None,
            (false, _) => {
                debug!("rank {} skipping step {index}", self.controller.rank());
                self.steps.commit_step();
                return Ok(());
            }
        };
        let object = DataObject::from(data.clone());
        let written = self.part().and_then(|part| match step {
            Some((index, time)) => part.write_step(index, time, &object),
            None => part.write(&object),
        });
        self.gather(step, written)?;
        self.steps.commit_step();
        Ok(())
    }

    /// Waits for every rank, lets rank 0 add the step to the main file, and waits again.
    ///
    /// Every rank reaches both barriers whatever failed before.
    fn gather(&mut self, step: Option<(usize, f64)>, written: VtkHdfResult<()>) -> VtkHdfResult<()> {
        self.controller.barrier();
        let assembled = if self.controller.rank() == 0 {
            self.assemble(step)
        } else {
            Ok(())
        };
        self.controller.barrier();
        written.and(assembled)
    }

    fn assemble(&mut self, step: Option<(usize, f64)>) -> VtkHdfResult<()> {
        let index = step.map(|(index, _)| index);
        let parts = (0..self.controller.size())
            .map(|rank| open_part(&part_file_path(&self.path, rank), index))
            .collect::<VtkHdfResult<Vec<_>>>()?;

        let steps = parts
            .iter()
            .map(|part| get_number_of_steps(&part.root))
            .collect::<VtkHdfResult<Vec<_>>>()?;
        if !steps.iter().all_equal() {
            vtkhdf_bail!(
                FormatError: "the parts of {} hold different numbers of steps: {}",
                self.path.display(),
                steps.iter().join(", ")
            );
        }

        let links = if self.options.use_external_partitions() {
            parts
                .iter()
                .map(|part| {
                    Ok(PartLink {
                        file: file_name(&part.path),
                        layout: PieceLayout::resolve(&part.root, part.data.kind(), index, 0)?,
                    })
                })
                .collect::<VtkHdfResult<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let pieces = parts
            .iter()
            .enumerate()
            .map(|(i, part)| Piece {
                data: &part.data,
                link: links.get(i),
            })
            .collect::<Vec<_>>();

        let mut main = match self.main.take() {
            Some(main) => main,
            None => MainFile::create(&self.path, &self.options)?,
        };
        let result = main.leaf.write(step, &pieces).and_then(|()| main.file.flush());
        self.main = Some(main);
        debug!(
            "assembled {} parts into {}",
            parts.len(),
            self.path.display()
        );
        result
    }

    /// Closes the part file of this rank and, on rank 0, the main file.
    pub fn finish(mut self) -> VtkHdfResult<()> {
        self.steps.finalize();
        let part = self.part.take().map_or(Ok(()), VtkHdfWriter::finish);
        self.controller.barrier();
        let main = self.main.take().map_or(Ok(()), |main| main.file.close());
        part.and(main)
    }
}

fn open_part(path: &Path, step: Option<usize>) -> VtkHdfResult<Part> {
    let file = ContainerFile::open(path, Mode::Read)?;
    let (root, descriptor) = open_root(&file)?;
    let kind = descriptor.data_type().leaf_kind().ok_or_else(|| {
        vtkhdf_err!(FormatError: "part {} holds a {}", path.display(), descriptor.data_type())
    })?;
    let data = read_piece(&root, kind, step, 0)
        .map_err(|e| e.with_context(format!("reading part {}", path.display())))?;
    Ok(Part {
        path: path.to_path_buf(),
        root,
        data,
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use vtkhdf_array::{CellArray, DataArray, UnstructuredGrid};

    use super::*;
    use crate::{LocalController, ReadOptions, ThreadController, VtkHdfFile, read};

    fn piece(rank: usize) -> DataSet {
        let shift = rank as f64;
        let points =
            DataArray::from_values("p", 3, vec![shift, 0., 0., shift + 1., 0., 0.]).unwrap();
        let cells = CellArray::try_new(vec![0, 2], vec![0, 1]).unwrap();
        UnstructuredGrid::try_new(points, cells, vec![3]).unwrap().into()
    }

    #[test]
    fn a_single_rank_writes_a_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.vtkhdf");
        let mut writer =
            DistributedWriter::new(LocalController, &path, WriteOptions::default()).unwrap();
        writer.write(&piece(0)).unwrap();
        assert!(writer.write(&piece(0)).is_err());
        writer.finish().unwrap();
        assert_eq!(
            read(&path, &ReadOptions::default()).unwrap(),
            DataObject::from(piece(0))
        );
    }

    #[test]
    fn ranks_write_one_piece_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.vtkhdf");
        let handles = ThreadController::group(3)
            .into_iter()
            .map(|controller| {
                let path = path.clone();
                thread::spawn(move || {
                    let rank = controller.rank();
                    let options = WriteOptions::default().with_external_partitions(true);
                    let mut writer = DistributedWriter::new(controller, &path, options).unwrap();
                    for step in 0..2 {
                        writer.write_step(step, step as f64, &piece(rank)).unwrap();
                    }
                    writer.finish().unwrap();
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let file = VtkHdfFile::open(&path).unwrap();
        assert_eq!(file.number_of_steps().unwrap(), 2);
        assert_eq!(file.number_of_pieces(1).unwrap(), 3);
        for rank in 0..3 {
            let mine = file
                .read(&ReadOptions::default().with_step(1).with_piece(rank, 3))
                .unwrap();
            let part = read(
                part_file_path(&path, rank),
                &ReadOptions::default().with_step(1),
            )
            .unwrap();
            assert_eq!(mine, part);
        }
    }
}
