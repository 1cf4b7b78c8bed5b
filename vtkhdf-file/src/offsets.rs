//! Where the data of one piece at one time step lives inside the datasets of a leaf group.
//!
//! A temporal leaf appends every step after the previous one. For step `s` the `Steps` group
//! records the base of the step in each dataset:
//!
//! - `PartOffsets[s]` indexes the per-piece count datasets (`NumberOfPoints` and friends),
//! - `PointOffsets[s]` indexes `Points`,
//! - `CellOffsets[s, t]` indexes the cells of topology `t` (`Types` for unstructured grids),
//! - `ConnectivityIdOffsets[s, t]` indexes `Connectivity` of topology `t`.
//!
//! Every piece stores one more offset than it has cells, so the step's base in `Offsets` is
//! `CellOffsets[s, t] + PartOffsets[s]`. Within a step, a piece starts after the elements of the
//! pieces before it.

use std::ops::Range;

use vtkhdf_array::{ALL_ATTRIBUTE_TYPES, ALL_TOPOLOGIES, AttributeType, DataSetKind, ImageData};
use vtkhdf_container::Group;
use vtkhdf_dtype::{Index, to_usize};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::{
    MetadataSource, dataset_rows, get_array_names, get_array_offset, get_attribute_ints,
    get_field_array_size, sum_sizes,
};

/// The topology groups of a leaf kind; the empty prefix is the leaf group itself.
pub(crate) fn topology_prefixes(kind: DataSetKind) -> Vec<&'static str> {
    match kind {
        DataSetKind::ImageData => vec![],
        DataSetKind::UnstructuredGrid => vec![""],
        DataSetKind::PolyData => ALL_TOPOLOGIES.iter().map(|t| t.name()).collect(),
    }
}

/// Path of dataset `name` within a topology group.
pub(crate) fn in_topology(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Path of array `name` of attribute kind `kind`.
pub(crate) fn array_path(kind: AttributeType, name: &str) -> String {
    format!("{}/{name}", kind.group_name())
}

fn single(source: &impl MetadataSource, name: &str, offset: usize) -> VtkHdfResult<usize> {
    match source.get_metadata(name, 1, offset)?.as_slice() {
        [value] => to_usize(*value),
        other => Err(vtkhdf_err!(
            FormatError: "{name} row {offset} holds {} values",
            other.len()
        )),
    }
}

/// The bases of one time step inside the geometry datasets of a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryOffsets {
    pub part_offset: usize,
    pub point_offset: usize,
    /// One base per topology
    pub cell_offsets: Vec<usize>,
    /// One base per topology
    pub connectivity_offsets: Vec<usize>,
}

impl GeometryOffsets {
    /// The bases of a leaf without steps.
    pub fn zero(topologies: usize) -> Self {
        Self {
            part_offset: 0,
            point_offset: 0,
            cell_offsets: vec![0; topologies],
            connectivity_offsets: vec![0; topologies],
        }
    }

    /// Reads the bases of `step` from the `Steps` index of a leaf with `topologies` topologies.
    ///
    /// Any missing or short index dataset fails the whole resolution.
    pub fn resolve(source: &impl MetadataSource, step: usize, topologies: usize) -> VtkHdfResult<Self> {
        let part_offset = single(source, "Steps/PartOffsets", step)?;
        let point_offset = single(source, "Steps/PointOffsets", step)?;
        let per_topology = |name: &str| -> VtkHdfResult<Vec<usize>> {
            let values = source.get_metadata(name, 1, step)?;
            if values.len() != topologies {
                vtkhdf_bail!(
                    FormatError: "{name} records {} topologies, expected {topologies}",
                    values.len()
                );
            }
            values.into_iter().map(to_usize).collect()
        };
        let offsets = Self {
            part_offset,
            point_offset,
            cell_offsets: per_topology("Steps/CellOffsets")?,
            connectivity_offsets: per_topology("Steps/ConnectivityIdOffsets")?,
        };
        log::trace!(
            "step {step}: parts from {}, points from {}",
            offsets.part_offset,
            offsets.point_offset
        );
        Ok(offsets)
    }

    /// The bases at which the next step would start in `group`, from the sizes on disk.
    pub(crate) fn current(group: &Group, kind: DataSetKind) -> VtkHdfResult<Self> {
        let prefixes = topology_prefixes(kind);
        let mut offsets = Self {
            part_offset: dataset_rows(group, "NumberOfPoints")?,
            point_offset: dataset_rows(group, "Points")?,
            cell_offsets: Vec::with_capacity(prefixes.len()),
            connectivity_offsets: Vec::with_capacity(prefixes.len()),
        };
        for prefix in prefixes {
            let offsets_rows = dataset_rows(group, &in_topology(prefix, "Offsets"))?;
            let parts = dataset_rows(group, &in_topology(prefix, "NumberOfCells"))?;
            offsets.cell_offsets.push(offsets_rows.saturating_sub(parts));
            offsets
                .connectivity_offsets
                .push(dataset_rows(group, &in_topology(prefix, "Connectivity"))?);
        }
        Ok(offsets)
    }
}

/// Number of pieces a leaf group holds at `step`, or in total when it has no steps.
pub fn number_of_pieces(group: &Group, kind: DataSetKind, step: Option<usize>) -> VtkHdfResult<usize> {
    if kind == DataSetKind::ImageData {
        return Ok(1);
    }
    match step {
        None => dataset_rows(group, "NumberOfPoints"),
        Some(step) => {
            if dataset_rows(group, "Steps/NumberOfParts")? > step {
                single(group, "Steps/NumberOfParts", step)
            } else {
                let part_offset = single(group, "Steps/PartOffsets", step)?;
                Ok(dataset_rows(group, "NumberOfPoints")?.saturating_sub(part_offset))
            }
        }
    }
}

/// Elements of the pieces that precede a piece within its step.
#[derive(Debug, Clone, Copy, Default)]
struct Elements {
    points: usize,
    cells: usize,
}

/// The rows of every dataset of a leaf group that hold one piece at one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceLayout {
    datasets: Vec<(String, Range<usize>)>,
    number_of_points: usize,
    number_of_cells: usize,
}

impl PieceLayout {
    /// Locates piece `piece` of the leaf in `group` at `step`, or in a leaf without steps.
    pub fn resolve(
        group: &Group,
        kind: DataSetKind,
        step: Option<usize>,
        piece: usize,
    ) -> VtkHdfResult<Self> {
        let (mut layout, before) = match kind {
            DataSetKind::ImageData => (Self::image(group)?, Elements::default()),
            DataSetKind::PolyData | DataSetKind::UnstructuredGrid => {
                Self::point_set(group, kind, step, piece)?
            }
        };
        layout.add_arrays(group, kind, step, piece, before)?;
        Ok(layout)
    }

    fn image(group: &Group) -> VtkHdfResult<Self> {
        let image = image_geometry(group)?;
        Ok(Self {
            datasets: Vec::new(),
            number_of_points: image.number_of_points(),
            number_of_cells: image.number_of_cells(),
        })
    }

    fn point_set(
        group: &Group,
        kind: DataSetKind,
        step: Option<usize>,
        piece: usize,
    ) -> VtkHdfResult<(Self, Elements)> {
        let prefixes = topology_prefixes(kind);
        let offsets = match step {
            Some(step) => GeometryOffsets::resolve(group, step, prefixes.len())?,
            None => GeometryOffsets::zero(prefixes.len()),
        };
        let part = offsets.part_offset;

        let points_before = sum_sizes(&group.get_metadata("NumberOfPoints", piece, part)?)?;
        let number_of_points = single(group, "NumberOfPoints", part + piece)?;
        let start = offsets.point_offset + points_before;
        let mut datasets = vec![("Points".to_string(), start..start + number_of_points)];

        let mut cells_before = 0;
        let mut number_of_cells = 0;
        for (t, prefix) in prefixes.iter().enumerate() {
            let counts = in_topology(prefix, "NumberOfCells");
            let before = sum_sizes(&group.get_metadata(&counts, piece, part)?)?;
            let cells = single(group, &counts, part + piece)?;
            let ids = in_topology(prefix, "NumberOfConnectivityIds");
            let ids_before = sum_sizes(&group.get_metadata(&ids, piece, part)?)?;
            let connectivity = single(group, &ids, part + piece)?;

            let cell_start = offsets.cell_offsets[t] + before;
            if kind == DataSetKind::UnstructuredGrid {
                datasets.push(("Types".to_string(), cell_start..cell_start + cells));
            }
            let offsets_start = cell_start + part + piece;
            datasets.push((
                in_topology(prefix, "Offsets"),
                offsets_start..offsets_start + cells + 1,
            ));
            let ids_start = offsets.connectivity_offsets[t] + ids_before;
            datasets.push((
                in_topology(prefix, "Connectivity"),
                ids_start..ids_start + connectivity,
            ));
            cells_before += before;
            number_of_cells += cells;
        }

        let layout = Self {
            datasets,
            number_of_points,
            number_of_cells,
        };
        Ok((
            layout,
            Elements {
                points: points_before,
                cells: cells_before,
            },
        ))
    }

    fn add_arrays(
        &mut self,
        group: &Group,
        kind: DataSetKind,
        step: Option<usize>,
        piece: usize,
        before: Elements,
    ) -> VtkHdfResult<()> {
        let image = match kind {
            DataSetKind::ImageData => Some(image_geometry(group)?),
            _ => None,
        };

        for attribute in ALL_ATTRIBUTE_TYPES {
            if attribute == AttributeType::Field && piece != 0 {
                continue;
            }
            for name in get_array_names(group, attribute)? {
                let path = array_path(attribute, &name);
                let base = match step {
                    Some(step) => get_array_offset(group, step, attribute, &name)?
                        .map(to_usize)
                        .transpose()?
                        .unwrap_or(0),
                    None => 0,
                };
                let rows = match (attribute, &image) {
                    (AttributeType::Field, _) => field_rows(group, step, &name, &path, base)?,
                    (AttributeType::Point, Some(image)) => {
                        image_rows(&path, base, image.dimensions())?
                    }
                    (AttributeType::Cell, Some(image)) => {
                        image_rows(&path, base, image.cell_dimensions())?
                    }
                    (AttributeType::Point, None) => {
                        let start = base + before.points;
                        start..start + self.number_of_points
                    }
                    (AttributeType::Cell, None) => {
                        let start = base + before.cells;
                        start..start + self.number_of_cells
                    }
                };
                self.datasets.push((path, rows));
            }
        }
        Ok(())
    }

    /// The rows of dataset `name`, relative to the leaf group.
    pub fn range(&self, name: &str) -> VtkHdfResult<Range<usize>> {
        self.datasets
            .iter()
            .find_map(|(n, rows)| (n == name).then(|| rows.clone()))
            .ok_or_else(|| vtkhdf_err!(NotFound: "the piece stores nothing in {name}"))
    }

    /// Every dataset holding data of the piece, with its rows.
    pub fn datasets(&self) -> &[(String, Range<usize>)] {
        &self.datasets
    }

    pub fn number_of_points(&self) -> usize {
        self.number_of_points
    }

    /// Number of cells over all topologies.
    pub fn number_of_cells(&self) -> usize {
        self.number_of_cells
    }
}

/// The geometry recorded on an image data group, without arrays.
pub(crate) fn image_geometry(group: &Group) -> VtkHdfResult<ImageData> {
    let extent = get_attribute_ints(group, "WholeExtent", 6)?;
    let whole = <[Index; 6]>::try_from(extent.as_slice())
        .map_err(|_| vtkhdf_err!(FormatError: "WholeExtent of {} is not six values", group.path()))?;
    ImageData::try_new(whole)
}

/// Rows of an image array starting `offset` tuples in; every `[z, y, x]` block is one step.
fn image_rows(path: &str, offset: usize, dims: [usize; 3]) -> VtkHdfResult<Range<usize>> {
    let [nx, ny, nz] = dims;
    let plane = nx * ny;
    if plane == 0 || offset % plane != 0 {
        vtkhdf_bail!(FormatError: "offset {offset} of {path} does not start a {nx}x{ny} plane");
    }
    let start = offset / plane;
    Ok(start..start + nz)
}

fn field_rows(
    group: &Group,
    step: Option<usize>,
    name: &str,
    path: &str,
    base: usize,
) -> VtkHdfResult<Range<usize>> {
    let total = dataset_rows(group, path)?;
    let Some(step) = step else {
        return Ok(0..total);
    };
    match get_field_array_size(group, step, name)? {
        [components, _] if components < 0 => Ok(base..total),
        [_, tuples] => Ok(base..base + to_usize(tuples)?),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vtkhdf_error::VtkHdfError;

    use super::*;

    #[derive(Default)]
    struct Fake(HashMap<&'static str, (usize, Vec<Index>)>);

    impl Fake {
        fn with(mut self, name: &'static str, width: usize, values: Vec<Index>) -> Self {
            self.0.insert(name, (width, values));
            self
        }
    }

    impl MetadataSource for Fake {
        fn get_metadata(&self, name: &str, size: usize, offset: usize) -> VtkHdfResult<Vec<Index>> {
            let (width, values) = self
                .0
                .get(name)
                .ok_or_else(|| vtkhdf_err!(NotFound: "no {name}"))?;
            values
                .get(offset * width..(offset + size) * width)
                .map(<[Index]>::to_vec)
                .ok_or_else(|| vtkhdf_err!(RangeError: "{name} too short"))
        }
    }

    #[test]
    fn resolves_the_bases_of_a_step() {
        let source = Fake::default()
            .with("Steps/PartOffsets", 1, vec![0, 2, 2])
            .with("Steps/PointOffsets", 1, vec![0, 10, 10])
            .with("Steps/CellOffsets", 1, vec![0, 4, 4])
            .with("Steps/ConnectivityIdOffsets", 1, vec![0, 16, 16]);
        let offsets = GeometryOffsets::resolve(&source, 1, 1).unwrap();
        assert_eq!(
            offsets,
            GeometryOffsets {
                part_offset: 2,
                point_offset: 10,
                cell_offsets: vec![4],
                connectivity_offsets: vec![16],
            }
        );
    }

    #[test]
    fn resolves_every_topology() {
        let source = Fake::default()
            .with("Steps/PartOffsets", 1, vec![0, 1])
            .with("Steps/PointOffsets", 1, vec![0, 8])
            .with("Steps/CellOffsets", 4, vec![0, 0, 0, 0, 1, 2, 3, 4])
            .with("Steps/ConnectivityIdOffsets", 4, vec![0, 0, 0, 0, 5, 6, 7, 8]);
        let offsets = GeometryOffsets::resolve(&source, 1, 4).unwrap();
        assert_eq!(offsets.cell_offsets, vec![1, 2, 3, 4]);
        assert_eq!(offsets.connectivity_offsets, vec![5, 6, 7, 8]);
    }

    #[test]
    fn missing_indices_fail_the_resolution() {
        let source = Fake::default()
            .with("Steps/PartOffsets", 1, vec![0])
            .with("Steps/PointOffsets", 1, vec![0]);
        assert!(matches!(
            GeometryOffsets::resolve(&source, 0, 1).unwrap_err(),
            VtkHdfError::NotFound(..)
        ));
        assert!(GeometryOffsets::resolve(&source, 1, 1).is_err());
    }

    #[test]
    fn negative_offsets_are_rejected() {
        let source = Fake::default()
            .with("Steps/PartOffsets", 1, vec![-1])
            .with("Steps/PointOffsets", 1, vec![0])
            .with("Steps/CellOffsets", 1, vec![0])
            .with("Steps/ConnectivityIdOffsets", 1, vec![0]);
        assert!(matches!(
            GeometryOffsets::resolve(&source, 0, 1).unwrap_err(),
            VtkHdfError::RangeError(..)
        ));
    }

    #[test]
    fn image_rows_follow_whole_planes() {
        assert_eq!(image_rows("PointData/T", 24, [3, 4, 2]).unwrap(), 2..4);
        assert!(image_rows("PointData/T", 5, [3, 4, 2]).is_err());
    }
}
