//! Names of the sibling files a main file references.
//!
//! A sibling is named after the main file's stem with a suffix: `mesh.vtkhdf` stores its pieces
//! in `mesh_part0.vtkhdf`, `mesh_part1.vtkhdf`, ... and its composite leaves in
//! `mesh_block0.vtkhdf`, ... Nesting composes, so piece 1 of block 2 lives in
//! `mesh_block2_part1.vtkhdf`.

use std::path::{Path, PathBuf};

use crate::DEFAULT_EXTENSION;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    path.with_file_name(format!("{stem}{suffix}.{extension}"))
}

/// The sibling file holding piece `piece` of the file at `path`.
pub fn part_file_path(path: &Path, piece: usize) -> PathBuf {
    sibling(path, &format!("_part{piece}"))
}

/// The sibling file holding composite leaf `ordinal` of the file at `path`.
pub fn block_file_path(path: &Path, ordinal: usize) -> PathBuf {
    sibling(path, &format!("_block{ordinal}"))
}

/// The name a sibling is referenced by from its main file.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siblings_share_the_stem() {
        let main = Path::new("/data/run/mesh.vtkhdf");
        assert_eq!(
            part_file_path(main, 3),
            PathBuf::from("/data/run/mesh_part3.vtkhdf")
        );
        assert_eq!(
            block_file_path(main, 0),
            PathBuf::from("/data/run/mesh_block0.vtkhdf")
        );
        assert_eq!(
            part_file_path(&block_file_path(main, 2), 1),
            PathBuf::from("/data/run/mesh_block2_part1.vtkhdf")
        );
        assert_eq!(file_name(&part_file_path(main, 3)), "mesh_part3.vtkhdf");
    }

    #[test]
    fn missing_extensions_get_the_default() {
        assert_eq!(
            part_file_path(Path::new("mesh"), 0),
            PathBuf::from("mesh_part0.vtkhdf")
        );
        assert_eq!(
            part_file_path(Path::new("mesh.hdf"), 1),
            PathBuf::from("mesh_part1.hdf")
        );
    }
}
