use std::path::Path;

use vtkhdf_container::{ContainerFile, Group, Mode};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::{DataSetType, MAX_MAJOR_VERSION, VTKHDF_ROOT_PATH, get_attribute_ints, get_attribute_str};

/// The `Version` and `Type` of a VTKHDF root group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootDescriptor {
    version: (i64, i64),
    data_type: DataSetType,
}

impl RootDescriptor {
    /// Reads and validates the root attributes.
    ///
    /// Files whose major version is newer than [`MAX_MAJOR_VERSION`], or whose type is not read
    /// by this crate, are rejected with a format error.
    pub fn read(root: &Group) -> VtkHdfResult<Self> {
        let version = get_attribute_ints(root, "Version", 2).map_err(
            |e| vtkhdf_err!(FormatError: "{} is not a VTKHDF root: {e}", root.path()),
        )?;
        let (major, minor) = (version[0], version[1]);
        if !(1..=MAX_MAJOR_VERSION).contains(&major) {
            vtkhdf_bail!(
                FormatError: "VTKHDF version {major}.{minor} is not supported, expected a major \
                version between 1 and {MAX_MAJOR_VERSION}"
            );
        }

        let data_type: DataSetType = get_attribute_str(root, "Type")
            .map_err(|e| vtkhdf_err!(FormatError: "{} has no dataset type: {e}", root.path()))?
            .parse()?;
        if data_type == DataSetType::OverlappingAMR {
            vtkhdf_bail!(FormatError: "OverlappingAMR files cannot be read");
        }
        log::debug!("{} holds {data_type}, version {major}.{minor}", root.path());
        Ok(Self {
            version: (major, minor),
            data_type,
        })
    }

    pub fn version(&self) -> (i64, i64) {
        self.version
    }

    pub fn data_type(&self) -> DataSetType {
        self.data_type
    }
}

/// Opens the `/VTKHDF` root of a container and validates it.
pub(crate) fn open_root(file: &ContainerFile) -> VtkHdfResult<(Group, RootDescriptor)> {
    let root = file.group(VTKHDF_ROOT_PATH)?;
    let descriptor = RootDescriptor::read(&root)?;
    Ok((root, descriptor))
}

/// Whether `path` is a container with a readable VTKHDF root.
pub fn can_read_file(path: impl AsRef<Path>) -> bool {
    match ContainerFile::open(path.as_ref(), Mode::Read).and_then(|file| open_root(&file)) {
        Ok(_) => true,
        Err(e) => {
            log::debug!("cannot read {}: {e}", path.as_ref().display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use vtkhdf_error::VtkHdfError;

    use super::*;

    fn root_with(version: Vec<i64>, data_type: &str) -> (tempfile::TempDir, ContainerFile) {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("root.vtkhdf")).unwrap();
        let root = file.root().create_group("VTKHDF").unwrap();
        root.set_attribute("Version", version).unwrap();
        root.set_attribute("Type", data_type).unwrap();
        (dir, file)
    }

    #[rstest]
    #[case(vec![1, 0], true)]
    #[case(vec![2, 3], true)]
    #[case(vec![2, 9], true)]
    #[case(vec![3, 0], false)]
    #[case(vec![0, 1], false)]
    fn major_versions_are_checked(#[case] version: Vec<i64>, #[case] ok: bool) {
        let (_dir, file) = root_with(version, "UnstructuredGrid");
        let result = open_root(&file);
        assert_eq!(result.is_ok(), ok);
        if let Err(e) = result {
            assert!(matches!(e, VtkHdfError::FormatError(..)));
        }
    }

    #[test]
    fn missing_version_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = ContainerFile::create(dir.path().join("bare.vtkhdf")).unwrap();
        file.root()
            .create_group("VTKHDF")
            .unwrap()
            .set_attribute("Type", "PolyData")
            .unwrap();
        assert!(matches!(
            open_root(&file).unwrap_err(),
            VtkHdfError::FormatError(..)
        ));
    }

    #[test]
    fn overlapping_amr_is_rejected() {
        let (_dir, file) = root_with(vec![2, 0], "OverlappingAMR");
        assert!(matches!(
            open_root(&file).unwrap_err(),
            VtkHdfError::FormatError(..)
        ));
    }

    #[test]
    fn descriptor_reports_the_root() {
        let (_dir, file) = root_with(vec![2, 1], "MultiBlockDataSet");
        let (_root, descriptor) = open_root(&file).unwrap();
        assert_eq!(descriptor.version(), (2, 1));
        assert_eq!(descriptor.data_type(), DataSetType::MultiBlockDataSet);
    }

    #[test]
    fn other_files_cannot_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.vtkhdf");
        ContainerFile::create(&path).unwrap().close().unwrap();
        assert!(!can_read_file(&path));
        assert!(!can_read_file(dir.path().join("missing.vtkhdf")));
    }
}
