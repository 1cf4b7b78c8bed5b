use std::fmt::{Debug, Formatter};
use std::ops::Range;

use bytes::Bytes;
use vtkhdf_dtype::{NativePType, NativeType, PType, decode_le, encode_le};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::filter::{deflate, inflate};
use crate::footer::{DatasetNode, Segment, SegmentData};
use crate::{ContainerFile, Hyperslab, Mode};

/// A scoped handle on a dataset of a container file.
pub struct Dataset {
    file: ContainerFile,
    path: String,
}

impl Dataset {
    pub(crate) fn acquire(file: ContainerFile, path: String) -> Self {
        file.handle_acquired(&path);
        Self { file, path }
    }

    /// Absolute path of this dataset.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn node(&self) -> VtkHdfResult<DatasetNode> {
        self.file
            .with_tree(|root| root.dataset(&self.path).cloned())
    }

    pub fn dtype(&self) -> VtkHdfResult<NativeType> {
        Ok(self.node()?.dtype)
    }

    /// Current shape. The first axis grows as rows are appended.
    pub fn dims(&self) -> VtkHdfResult<Vec<usize>> {
        Ok(self.node()?.dims)
    }

    /// Deflate level of locally stored rows, if any.
    pub fn compression(&self) -> VtkHdfResult<Option<u32>> {
        Ok(self.node()?.compression)
    }

    /// Reads the selected elements as contiguous little-endian bytes.
    ///
    /// The selection is checked against the dimensions before anything is read.
    pub fn read(&self, selection: &Hyperslab) -> VtkHdfResult<Bytes> {
        let node = self.node()?;
        selection
            .check(&node.dims)
            .map_err(|e| e.with_context(format!("reading {}", self.path)))?;
        let rows = selection.leading_rows();
        let raw = self.read_rows(&node, rows.clone())?;
        if raw.len() != rows.len() * node.row_bytes() {
            vtkhdf_bail!(
                FormatError: "rows {}..{} of {} are not backed by data",
                rows.start,
                rows.end,
                self.path
            );
        }
        log::trace!("read {} elements of {}", selection.num_elements(), self.path);
        Ok(Bytes::from(selection.gather(
            &raw,
            &node.dims,
            node.dtype.byte_width(),
        )))
    }

    pub fn read_all(&self) -> VtkHdfResult<Bytes> {
        self.read(&Hyperslab::all(&self.dims()?))
    }

    /// Reads the selected elements as native values of the dataset's element type.
    pub fn read_values<T: NativePType>(&self, selection: &Hyperslab) -> VtkHdfResult<Vec<T>> {
        check_storage::<T>(self.dtype()?)?;
        decode_le(&self.read(selection)?)
    }

    fn read_rows(&self, node: &DatasetNode, rows: Range<usize>) -> VtkHdfResult<Vec<u8>> {
        let mut out = Vec::with_capacity(rows.len() * node.row_bytes());
        let mut first_row = 0;
        for segment in &node.segments {
            if first_row >= rows.end {
                break;
            }
            let start = rows.start.max(first_row);
            let end = rows.end.min(first_row + segment.rows);
            if start < end {
                let local = start - first_row..end - first_row;
                out.extend_from_slice(&self.read_segment(node, segment, local)?);
            }
            first_row += segment.rows;
        }
        Ok(out)
    }

    fn read_segment(
        &self,
        node: &DatasetNode,
        segment: &Segment,
        local: Range<usize>,
    ) -> VtkHdfResult<Bytes> {
        let row_bytes = node.row_bytes();
        match &segment.data {
            SegmentData::Local {
                offset,
                deflate: false,
                ..
            } => self.file.read_payload(
                offset + (local.start * row_bytes) as u64,
                (local.len() * row_bytes) as u64,
            ),
            SegmentData::Local {
                offset,
                length,
                deflate: true,
            } => {
                let raw = inflate(&self.file.read_payload(*offset, *length)?)?;
                if raw.len() != segment.rows * row_bytes {
                    vtkhdf_bail!(
                        FormatError: "deflated segment of {} holds {} bytes, expected {}",
                        self.path,
                        raw.len(),
                        segment.rows * row_bytes
                    );
                }
                Ok(Bytes::from(raw).slice(local.start * row_bytes..local.end * row_bytes))
            }
            SegmentData::External {
                file,
                dataset,
                row_offset,
            } => {
                let external = open_external(&self.file, file)?;
                let target = external_dataset(&external, file, dataset)?;
                let target_node = target.node()?;
                let rows = row_offset + local.start..row_offset + local.end;
                if rows.end > target_node.dims.first().copied().unwrap_or_default() {
                    vtkhdf_bail!(
                        ReferenceError: "{file}:{dataset} no longer holds rows {}..{}",
                        rows.start,
                        rows.end
                    );
                }
                Ok(Bytes::from(target.read_rows(&target_node, rows)?))
            }
        }
    }

    /// Appends whole rows of little-endian bytes and returns the index of the first new row.
    ///
    /// The payload is written before the dataset's extent grows, so a failure part way leaves
    /// the previous extent describing complete data only.
    pub fn append(&self, bytes: &[u8]) -> VtkHdfResult<usize> {
        self.file.check_writable()?;
        let node = self.node()?;
        let rows = self.rows_in(&node, bytes)?;
        if rows == 0 {
            return Ok(node.dims[0]);
        }
        let segment = self.write_segment(&node, bytes, rows)?;
        self.file.with_tree_mut(|root| {
            let dataset = root.dataset_mut(&self.path)?;
            let first = dataset.dims[0];
            dataset.segments.push(segment);
            dataset.dims[0] += rows;
            Ok(first)
        })
    }

    pub fn append_values<T: NativePType>(&self, values: &[T]) -> VtkHdfResult<usize> {
        check_storage::<T>(self.dtype()?)?;
        self.append(&encode_le(values))
    }

    /// Overwrites rows from `start_row` on, growing the dataset if the rows run past its end.
    pub fn write_rows(&self, start_row: usize, bytes: &[u8]) -> VtkHdfResult<()> {
        self.file.check_writable()?;
        let node = self.node()?;
        let extent = node.dims[0];
        if start_row > extent {
            vtkhdf_bail!(
                RangeError: "cannot write from row {start_row} of {}, which holds {extent} rows",
                self.path
            );
        }
        let rows = self.rows_in(&node, bytes)?;
        if rows == 0 {
            return Ok(());
        }
        if start_row == extent {
            self.append(bytes)?;
            return Ok(());
        }

        let end_row = start_row + rows;
        let mut segments = self.trim(&node, 0..start_row)?;
        segments.push(self.write_segment(&node, bytes, rows)?);
        segments.extend(self.trim(&node, end_row..extent.max(end_row))?);
        self.file.with_tree_mut(|root| {
            let dataset = root.dataset_mut(&self.path)?;
            dataset.segments = segments;
            dataset.dims[0] = extent.max(end_row);
            Ok(())
        })
    }

    /// Appends rows `rows` of dataset `dataset` in the sibling file `file` as a virtual mapping.
    ///
    /// The target must exist and agree on element type and inner dimensions. Returns the index
    /// of the first new row.
    pub fn append_external(
        &self,
        file: &str,
        dataset: &str,
        rows: Range<usize>,
    ) -> VtkHdfResult<usize> {
        self.file.check_writable()?;
        let node = self.node()?;
        let external = open_external(&self.file, file)?;
        let target = external_dataset(&external, file, dataset)?.node()?;
        if target.dtype != node.dtype {
            vtkhdf_bail!(
                TypeError: "{file}:{dataset} holds {} elements, {} holds {}",
                target.dtype,
                self.path,
                node.dtype
            );
        }
        if target.dims.get(1..) != node.dims.get(1..) {
            vtkhdf_bail!(RangeError: "{file}:{dataset} rows do not match the rows of {}", self.path);
        }
        if rows.start > rows.end || rows.end > target.dims[0] {
            vtkhdf_bail!(
                RangeError: "rows {}..{} exceed the {} rows of {file}:{dataset}",
                rows.start,
                rows.end,
                target.dims[0]
            );
        }
        if rows.is_empty() {
            return Ok(node.dims[0]);
        }

        log::trace!(
            "linking {file}:{dataset} rows {}..{} into {}",
            rows.start,
            rows.end,
            self.path
        );
        let segment = Segment {
            rows: rows.len(),
            data: SegmentData::External {
                file: file.to_string(),
                dataset: dataset.to_string(),
                row_offset: rows.start,
            },
        };
        self.file.with_tree_mut(|root| {
            let dataset = root.dataset_mut(&self.path)?;
            let first = dataset.dims[0];
            dataset.segments.push(segment);
            dataset.dims[0] += rows.len();
            Ok(first)
        })
    }

    fn rows_in(&self, node: &DatasetNode, bytes: &[u8]) -> VtkHdfResult<usize> {
        let row_bytes = node.row_bytes();
        if row_bytes == 0 {
            if bytes.is_empty() {
                return Ok(0);
            }
            vtkhdf_bail!("{} has empty rows and cannot take data", self.path);
        }
        if bytes.len() % row_bytes != 0 {
            vtkhdf_bail!(
                "{} bytes do not form whole rows of {row_bytes} bytes for {}",
                bytes.len(),
                self.path
            );
        }
        Ok(bytes.len() / row_bytes)
    }

    fn write_segment(&self, node: &DatasetNode, bytes: &[u8], rows: usize) -> VtkHdfResult<Segment> {
        let encoded;
        let (payload, deflated) = match node.compression {
            Some(level) => {
                encoded = deflate(bytes, level)?;
                (encoded.as_slice(), true)
            }
            None => (bytes, false),
        };
        let offset = self.file.write_payload(payload)?;
        Ok(Segment {
            rows,
            data: SegmentData::Local {
                offset,
                length: payload.len() as u64,
                deflate: deflated,
            },
        })
    }

    /// The segments covering `rows`, cut to fit. Partially kept deflated segments are rewritten
    /// uncompressed.
    fn trim(&self, node: &DatasetNode, rows: Range<usize>) -> VtkHdfResult<Vec<Segment>> {
        let row_bytes = node.row_bytes() as u64;
        let mut kept = Vec::new();
        let mut first_row = 0;
        for segment in &node.segments {
            let start = rows.start.max(first_row);
            let end = rows.end.min(first_row + segment.rows);
            if start < end {
                let local = start - first_row..end - first_row;
                let whole = local.len() == segment.rows;
                let data = match &segment.data {
                    _ if whole => segment.data.clone(),
                    SegmentData::Local {
                        offset,
                        deflate: false,
                        ..
                    } => SegmentData::Local {
                        offset: offset + local.start as u64 * row_bytes,
                        length: local.len() as u64 * row_bytes,
                        deflate: false,
                    },
                    SegmentData::Local { deflate: true, .. } => {
                        let bytes = self.read_segment(node, segment, local.clone())?;
                        SegmentData::Local {
                            offset: self.file.write_payload(&bytes)?,
                            length: bytes.len() as u64,
                            deflate: false,
                        }
                    }
                    SegmentData::External {
                        file,
                        dataset,
                        row_offset,
                    } => SegmentData::External {
                        file: file.clone(),
                        dataset: dataset.clone(),
                        row_offset: row_offset + local.start,
                    },
                };
                kept.push(Segment {
                    rows: local.len(),
                    data,
                });
            }
            first_row += segment.rows;
        }
        Ok(kept)
    }
}

impl Debug for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dataset").field(&self.path).finish()
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        self.file.handle_released(&self.path);
    }
}

fn check_storage<T: NativePType>(dtype: NativeType) -> VtkHdfResult<()> {
    let ptype = dtype.ptype()?;
    let storage = if ptype == PType::Char { PType::I8 } else { ptype };
    if storage != T::PTYPE {
        vtkhdf_bail!(TypeError: "dataset of {dtype} cannot be accessed as {}", T::PTYPE);
    }
    Ok(())
}

fn open_external(from: &ContainerFile, name: &str) -> VtkHdfResult<ContainerFile> {
    let path = from.resolve_sibling(name);
    if !path.is_file() {
        vtkhdf_bail!(ReferenceError: "external file {} is missing", path.display());
    }
    ContainerFile::open(&path, Mode::Read).map_err(|e| {
        vtkhdf_err!(
            ReferenceError: "external file {} is unreadable: {}",
            path.display(),
            e.innermost()
        )
    })
}

fn external_dataset(file: &ContainerFile, name: &str, dataset: &str) -> VtkHdfResult<Dataset> {
    file.dataset(dataset).map_err(|_| {
        vtkhdf_err!(ReferenceError: "external file {name} has no dataset {dataset}")
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use vtkhdf_error::VtkHdfError;

    use super::*;

    fn points(file: &ContainerFile, compression: Option<u32>) -> Dataset {
        file.root()
            .new_dataset("Points", NativeType::Double, &[3], compression)
            .unwrap()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(5))]
    fn append_grows_the_leading_axis(#[case] compression: Option<u32>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.vtkhdf");
        {
            let file = ContainerFile::create(&path).unwrap();
            let dataset = points(&file, compression);
            assert_eq!(dataset.append_values(&[0.0f64, 1., 2.]).unwrap(), 0);
            assert_eq!(dataset.append_values(&[3.0f64, 4., 5., 6., 7., 8.]).unwrap(), 1);
        }
        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        let dataset = file.dataset("/Points").unwrap();
        assert_eq!(dataset.dims().unwrap(), vec![3, 3]);
        assert_eq!(dataset.compression().unwrap(), compression);
        let middle = dataset
            .read_values::<f64>(&Hyperslab::rows(1..3, &[3]))
            .unwrap();
        assert_eq!(middle, vec![3., 4., 5., 6., 7., 8.]);
        let column = dataset
            .read_values::<f64>(&Hyperslab::new(vec![0, 2], vec![3, 1]))
            .unwrap();
        assert_eq!(column, vec![2., 5., 8.]);
    }

    #[test]
    fn out_of_range_selections_fail() {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("range.vtkhdf")).unwrap();
        let dataset = points(&file, None);
        dataset.append_values(&[0.0f64; 6]).unwrap();
        let err = dataset
            .read(&Hyperslab::new(vec![1, 0], vec![2, 3]))
            .unwrap_err();
        assert!(matches!(err.innermost(), VtkHdfError::RangeError(..)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("ragged.vtkhdf")).unwrap();
        let dataset = points(&file, None);
        assert!(dataset.append_values(&[0.0f64; 4]).is_err());
        assert!(dataset.append_values(&[0.0f32; 3]).is_err());
        assert_eq!(dataset.dims().unwrap(), vec![0, 3]);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(1))]
    fn write_rows_splits_segments(#[case] compression: Option<u32>) {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("split.vtkhdf")).unwrap();
        let dataset = file
            .root()
            .new_dataset("Offsets", NativeType::LLong, &[], compression)
            .unwrap();
        dataset.append_values(&[0i64, 1, 2, 3, 4]).unwrap();
        dataset.write_rows(1, &encode_le(&[10i64, 20])).unwrap();
        dataset.write_rows(4, &encode_le(&[40i64, 50])).unwrap();
        assert!(dataset.write_rows(7, &encode_le(&[0i64])).is_err());
        let values = dataset
            .read_values::<i64>(&Hyperslab::all(&dataset.dims().unwrap()))
            .unwrap();
        assert_eq!(values, vec![0, 10, 20, 3, 40, 50]);
    }

    #[test]
    fn external_rows_resolve_through_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("mesh_part0.vtkhdf");
        {
            let file = ContainerFile::create(&part).unwrap();
            let dataset = file
                .root()
                .new_dataset("Types", NativeType::UChar, &[], None)
                .unwrap();
            dataset.append_values(&[5u8, 9, 12]).unwrap();
        }
        let main = dir.path().join("mesh.vtkhdf");
        {
            let file = ContainerFile::create(&main).unwrap();
            let dataset = file
                .root()
                .new_dataset("Types", NativeType::UChar, &[], None)
                .unwrap();
            dataset.append_values(&[1u8]).unwrap();
            assert_eq!(
                dataset
                    .append_external("mesh_part0.vtkhdf", "/Types", 1..3)
                    .unwrap(),
                1
            );
            assert!(
                dataset
                    .append_external("mesh_part0.vtkhdf", "/Types", 2..4)
                    .is_err()
            );
            let err = dataset
                .append_external("mesh_part1.vtkhdf", "/Types", 0..1)
                .unwrap_err();
            assert!(matches!(err, VtkHdfError::ReferenceError(..)));
        }
        {
            let file = ContainerFile::open(&main, Mode::Read).unwrap();
            let types = file
                .dataset("/Types")
                .unwrap()
                .read_values::<u8>(&Hyperslab::all(&[3]))
                .unwrap();
            assert_eq!(types, vec![1, 9, 12]);
        }

        std::fs::remove_file(&part).unwrap();
        let file = ContainerFile::open(&main, Mode::Read).unwrap();
        let err = file.dataset("/Types").unwrap().read_all().unwrap_err();
        assert!(matches!(err, VtkHdfError::ReferenceError(..)));
    }

    #[test]
    fn char_datasets_read_as_i8() {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("chars.vtkhdf")).unwrap();
        let dataset = file
            .root()
            .new_dataset("Name", NativeType::Char, &[], None)
            .unwrap();
        dataset.append_values(&[104i8, 105]).unwrap();
        assert_eq!(
            dataset.read_values::<i8>(&Hyperslab::all(&[2])).unwrap(),
            vec![104, 105]
        );
        assert!(dataset.read_values::<u8>(&Hyperslab::all(&[2])).is_err());
    }
}
