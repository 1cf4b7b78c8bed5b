use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::footer::GroupNode;
use crate::{Dataset, EOF_SIZE, Group, HEADER_SIZE, MAGIC_BYTES, VERSION};

/// How a container file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    ReadWrite,
}

/// An open container file.
///
/// Clones share the same open file. Group and dataset handles keep the file alive; when the
/// last clone or handle is dropped, pending changes of a writable file are flushed.
#[derive(Clone)]
pub struct ContainerFile {
    shared: Arc<Shared>,
}

impl Debug for ContainerFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFile")
            .field("path", &self.shared.path)
            .field("mode", &self.shared.mode)
            .finish_non_exhaustive()
    }
}

struct Shared {
    path: PathBuf,
    mode: Mode,
    state: Mutex<State>,
    open_handles: AtomicUsize,
}

pub(crate) struct State {
    file: File,
    pub(crate) root: GroupNode,
    /// Where the next payload goes, never before the end of the live footer
    data_end: u64,
    dirty: bool,
}

impl ContainerFile {
    /// Creates a new, empty container file, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> VtkHdfResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&MAGIC_BYTES)?;
        file.write_all(&0u64.to_le_bytes())?;
        log::debug!("created container {}", path.display());
        Ok(Self::new(
            path,
            Mode::ReadWrite,
            State {
                file,
                root: GroupNode::default(),
                data_end: HEADER_SIZE as u64,
                dirty: true,
            },
        ))
    }

    /// Opens an existing container file.
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> VtkHdfResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == Mode::ReadWrite)
            .open(path)?;
        let (root, live_end) = read_footer(&mut file)
            .map_err(|e| e.with_context(format!("reading {}", path.display())))?;
        log::debug!("opened container {}", path.display());
        Ok(Self::new(
            path,
            mode,
            State {
                file,
                root,
                data_end: live_end,
                dirty: false,
            },
        ))
    }

    fn new(path: &Path, mode: Mode, state: State) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.to_path_buf(),
                mode,
                state: Mutex::new(state),
                open_handles: AtomicUsize::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    /// Resolves a file name stored in this container against the container's directory.
    pub fn resolve_sibling(&self, name: &str) -> PathBuf {
        match self.shared.path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// The root group.
    pub fn root(&self) -> Group {
        Group::acquire(self.clone(), "/".to_string())
    }

    /// Opens the group at an absolute path.
    pub fn group(&self, path: &str) -> VtkHdfResult<Group> {
        self.root().open_group(path)
    }

    /// Opens the dataset at an absolute path.
    pub fn dataset(&self, path: &str) -> VtkHdfResult<Dataset> {
        self.root().open_dataset(path)
    }

    /// Number of group and dataset handles currently alive on this file.
    pub fn open_handle_count(&self) -> usize {
        self.shared.open_handles.load(Ordering::Acquire)
    }

    pub(crate) fn handle_acquired(&self, path: &str) {
        self.shared.open_handles.fetch_add(1, Ordering::AcqRel);
        log::trace!("acquired handle {path} on {}", self.shared.path.display());
    }

    pub(crate) fn handle_released(&self, path: &str) {
        self.shared.open_handles.fetch_sub(1, Ordering::AcqRel);
        log::trace!("released handle {path} on {}", self.shared.path.display());
    }

    pub(crate) fn check_writable(&self) -> VtkHdfResult<()> {
        if self.shared.mode != Mode::ReadWrite {
            vtkhdf_bail!("{} is open read-only", self.shared.path.display());
        }
        Ok(())
    }

    /// Runs `f` over the tree of the file.
    pub(crate) fn with_tree<R>(&self, f: impl FnOnce(&GroupNode) -> VtkHdfResult<R>) -> VtkHdfResult<R> {
        f(&self.shared.state.lock().root)
    }

    /// Runs `f` over the tree of a writable file, marking it modified.
    pub(crate) fn with_tree_mut<R>(
        &self,
        f: impl FnOnce(&mut GroupNode) -> VtkHdfResult<R>,
    ) -> VtkHdfResult<R> {
        self.check_writable()?;
        let mut state = self.shared.state.lock();
        state.dirty = true;
        f(&mut state.root)
    }

    /// Appends bytes to the data region and returns their offset.
    pub(crate) fn write_payload(&self, bytes: &[u8]) -> VtkHdfResult<u64> {
        self.check_writable()?;
        let mut state = self.shared.state.lock();
        let offset = state.data_end;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(bytes)?;
        state.data_end += bytes.len() as u64;
        state.dirty = true;
        log::trace!(
            "wrote {} bytes at {offset} of {}",
            bytes.len(),
            self.shared.path.display()
        );
        Ok(offset)
    }

    pub(crate) fn read_payload(&self, offset: u64, length: u64) -> VtkHdfResult<Bytes> {
        let mut state = self.shared.state.lock();
        if offset.checked_add(length).is_none_or(|end| end > state.data_end) {
            vtkhdf_bail!(
                FormatError: "segment {offset}+{length} lies beyond the data region of {}",
                self.shared.path.display()
            );
        }
        let mut buffer = vec![0u8; usize::try_from(length).map_err(|_| {
            vtkhdf_err!(FormatError: "segment of {length} bytes cannot be addressed")
        })?];
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.read_exact(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }

    /// Writes a new footer after everything written so far and then points the header at it,
    /// making every change so far durable. Until the header moves, readers see the previous
    /// footer, which nothing written since has touched.
    pub fn flush(&self) -> VtkHdfResult<()> {
        if self.shared.mode != Mode::ReadWrite {
            return Ok(());
        }
        self.shared.flush()
    }

    /// Flushes and releases this reference to the file.
    pub fn close(self) -> VtkHdfResult<()> {
        self.flush()
    }
}

impl Shared {
    fn flush(&self) -> VtkHdfResult<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        let footer = serde_json::to_vec(&state.root)?;
        let mut eof = [0u8; EOF_SIZE];
        eof[0..2].copy_from_slice(&VERSION.to_le_bytes());
        eof[4..12].copy_from_slice(&(footer.len() as u64).to_le_bytes());
        eof[12..16].copy_from_slice(&MAGIC_BYTES);

        let footer_start = state.data_end;
        let live_end = footer_start + footer.len() as u64 + EOF_SIZE as u64;
        state.file.seek(SeekFrom::Start(footer_start))?;
        state.file.write_all(&footer)?;
        state.file.write_all(&eof)?;
        state.file.set_len(live_end)?;
        state.file.sync_data()?;

        state.file.seek(SeekFrom::Start(MAGIC_BYTES.len() as u64))?;
        state.file.write_all(&live_end.to_le_bytes())?;
        state.file.sync_data()?;
        state.data_end = live_end;
        state.dirty = false;
        log::debug!(
            "flushed container {} ({} footer bytes)",
            self.path.display(),
            footer.len()
        );
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.mode == Mode::ReadWrite {
            if let Err(e) = self.flush() {
                log::warn!(
                    "failed to flush {} on close: {e}",
                    self.path.display()
                );
            }
        }
    }
}

/// Reads the live footer tree and returns it with the offset at which it ends.
fn read_footer(file: &mut File) -> VtkHdfResult<(GroupNode, u64)> {
    let file_size = file.seek(SeekFrom::End(0))?;
    if file_size < (HEADER_SIZE + EOF_SIZE) as u64 {
        vtkhdf_bail!(FormatError: "file of {file_size} bytes is too small to be a container");
    }

    let mut header = [0u8; HEADER_SIZE];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;
    if header[0..4] != MAGIC_BYTES {
        vtkhdf_bail!(FormatError: "malformed file, invalid leading magic bytes");
    }
    let mut live_end = [0u8; 8];
    live_end.copy_from_slice(&header[4..12]);
    let live_end = u64::from_le_bytes(live_end);
    if live_end == 0 {
        vtkhdf_bail!(FormatError: "malformed file, it was never flushed");
    }
    if live_end > file_size || live_end < (HEADER_SIZE + EOF_SIZE) as u64 {
        vtkhdf_bail!(FormatError: "malformed file, footer end {live_end} lies outside the file");
    }

    let mut eof = [0u8; EOF_SIZE];
    file.seek(SeekFrom::Start(live_end - EOF_SIZE as u64))?;
    file.read_exact(&mut eof)?;
    if eof[12..16] != MAGIC_BYTES {
        vtkhdf_bail!(FormatError: "malformed file, invalid trailing magic bytes");
    }
    let version = u16::from_le_bytes([eof[0], eof[1]]);
    if version != VERSION {
        vtkhdf_bail!(FormatError: "malformed file, unsupported container version {version}");
    }
    let mut footer_len = [0u8; 8];
    footer_len.copy_from_slice(&eof[4..12]);
    let footer_len = u64::from_le_bytes(footer_len);
    let footer_start = (live_end - EOF_SIZE as u64)
        .checked_sub(footer_len)
        .filter(|start| *start >= HEADER_SIZE as u64)
        .ok_or_else(|| vtkhdf_err!(FormatError: "footer of {footer_len} bytes exceeds the file"))?;

    let mut footer = vec![0u8; usize::try_from(footer_len).map_err(|_| {
        vtkhdf_err!(FormatError: "footer of {footer_len} bytes cannot be addressed")
    })?];
    file.seek(SeekFrom::Start(footer_start))?;
    file.read_exact(&mut footer)?;
    let root = serde_json::from_slice(&footer)
        .map_err(|e| vtkhdf_err!(FormatError: "malformed file, unreadable footer: {e}"))?;
    Ok((root, live_end))
}

#[cfg(test)]
mod tests {
    use vtkhdf_dtype::NativeType;

    use super::*;
    use crate::{AttributeValue, Hyperslab};

    #[test]
    fn empty_container_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.vtkhdf");
        ContainerFile::create(&path).unwrap().close().unwrap();

        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        assert!(file.root().children().unwrap().is_empty());
    }

    #[test]
    fn reopening_for_write_keeps_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.vtkhdf");
        {
            let file = ContainerFile::create(&path).unwrap();
            file.root()
                .create_group("A")
                .unwrap()
                .set_attribute("n", vec![1i64])
                .unwrap();
        }
        {
            let file = ContainerFile::open(&path, Mode::ReadWrite).unwrap();
            file.root().create_group("B").unwrap();
        }
        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        assert_eq!(file.root().children().unwrap(), vec!["A", "B"]);
        assert_eq!(
            file.group("/A").unwrap().attribute("n").unwrap(),
            AttributeValue::Int(vec![1])
        );
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"this is not a container at all").unwrap();
        let err = ContainerFile::open(&path, Mode::Read).unwrap_err();
        assert!(matches!(
            err.innermost(),
            vtkhdf_error::VtkHdfError::FormatError(..)
        ));
    }

    /// Writes group `A` holding three rows, flushes, then appends more without flushing and
    /// leaks every handle as a crashed writer would.
    fn crash_after_flush(path: &Path) {
        let file = ContainerFile::create(path).unwrap();
        let group = file.root().create_group("A").unwrap();
        let dataset = group
            .new_dataset("Rows", NativeType::LLong, &[], None)
            .unwrap();
        dataset.append_values(&[1i64, 2, 3]).unwrap();
        file.flush().unwrap();

        dataset.append_values(&[4i64; 64]).unwrap();
        let late = file.root().create_group("B").unwrap();
        let _crashed = std::mem::ManuallyDrop::new((file, group, dataset, late));
    }

    #[test]
    fn interrupted_writes_keep_the_last_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.vtkhdf");
        crash_after_flush(&path);

        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        assert_eq!(file.root().children().unwrap(), vec!["A"]);
        let rows = file.dataset("/A/Rows").unwrap();
        assert_eq!(rows.dims().unwrap(), vec![3]);
        assert_eq!(
            rows.read_values::<i64>(&Hyperslab::all(&[3])).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn crashed_files_can_be_written_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.vtkhdf");
        crash_after_flush(&path);
        {
            let file = ContainerFile::open(&path, Mode::ReadWrite).unwrap();
            file.dataset("/A/Rows").unwrap().append_values(&[9i64]).unwrap();
            file.close().unwrap();
        }
        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        assert_eq!(
            file.dataset("/A/Rows")
                .unwrap()
                .read_values::<i64>(&Hyperslab::all(&[4]))
                .unwrap(),
            vec![1, 2, 3, 9]
        );
    }

    #[test]
    fn corrupt_footers_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.vtkhdf");
        {
            let file = ContainerFile::create(&path).unwrap();
            file.root().create_group("A").unwrap();
            file.close().unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let read_u64 = |at: usize| {
            usize::try_from(u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())).unwrap()
        };
        let eof = read_u64(MAGIC_BYTES.len()) - EOF_SIZE;
        let footer_start = eof - read_u64(eof + 4);
        bytes[footer_start] = b'#';
        std::fs::write(&path, bytes).unwrap();

        let err = ContainerFile::open(&path, Mode::Read).unwrap_err();
        assert!(matches!(
            err.innermost(),
            vtkhdf_error::VtkHdfError::FormatError(..)
        ));
    }

    #[test]
    fn unflushed_files_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unflushed.vtkhdf");
        let file = ContainerFile::create(&path).unwrap();
        let err = ContainerFile::open(&path, Mode::Read).unwrap_err();
        assert!(matches!(
            err.innermost(),
            vtkhdf_error::VtkHdfError::FormatError(..)
        ));
        drop(file);
        assert!(ContainerFile::open(&path, Mode::Read).is_ok());
    }

    #[test]
    fn read_only_files_reject_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.vtkhdf");
        ContainerFile::create(&path).unwrap().close().unwrap();
        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        assert!(file.root().create_group("A").is_err());
    }
}
