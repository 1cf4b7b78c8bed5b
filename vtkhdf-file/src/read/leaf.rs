use std::ops::Range;

use log::trace;
use vtkhdf_array::{
    ALL_ATTRIBUTE_TYPES, ALL_TOPOLOGIES, AttributeType, Attributes, CellArray, DataArray, DataSet,
    DataSetKind, ImageData, PolyData, UnstructuredGrid, merge_partitions,
};
use vtkhdf_container::Group;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::offsets::{image_geometry, in_topology};
use crate::{
    DataSetType, PARTITIONED_ATTRIBUTE, PieceLayout, ReadOptions, get_attribute_floats,
    get_attribute_str, get_number_of_steps, new_array_for_group, number_of_pieces,
    read_array_rows,
};

/// The leaf kind recorded in the `Type` attribute of `group`.
pub(crate) fn leaf_kind(group: &Group) -> VtkHdfResult<DataSetKind> {
    let data_type = get_attribute_str(group, "Type")?.parse::<DataSetType>()?;
    data_type
        .leaf_kind()
        .ok_or_else(|| vtkhdf_err!(FormatError: "{} holds a {data_type}, not a leaf", group.path()))
}

/// Whether the leaf in `group` was written from a partitioned dataset.
pub(crate) fn is_partitioned(group: &Group) -> VtkHdfResult<bool> {
    group.has_attribute(PARTITIONED_ATTRIBUTE)
}

/// The step of the leaf in `group` to read, `None` when it has no steps.
pub(crate) fn select_step(group: &Group, options: &ReadOptions) -> VtkHdfResult<Option<usize>> {
    let steps = get_number_of_steps(group)?;
    if steps == 0 {
        return Ok(None);
    }
    let step = options.step().unwrap_or(0);
    if step >= steps {
        vtkhdf_bail!(
            RangeError: "step {step} requested from {}, which holds {steps} steps",
            group.path()
        );
    }
    Ok(Some(step))
}

/// Reads the selected pieces of the leaf in `group`.
///
/// `select` picks the pieces out of the number the leaf holds at the step read.
pub(crate) fn read_leaf(
    group: &Group,
    options: &ReadOptions,
    select: impl FnOnce(usize) -> VtkHdfResult<Range<usize>>,
) -> VtkHdfResult<Vec<DataSet>> {
    let kind = leaf_kind(group)?;
    let step = select_step(group, options)?;
    let pieces = select(number_of_pieces(group, kind, step)?)?;
    trace!(
        "reading pieces {}..{} of {}",
        pieces.start,
        pieces.end,
        group.path()
    );
    let pieces = pieces
        .map(|piece| {
            read_piece(group, kind, step, piece)
                .map_err(|e| e.with_context(format!("reading piece {piece} of {}", group.path())))
        })
        .collect::<VtkHdfResult<Vec<_>>>()?;
    if options.merge_parts() && pieces.len() > 1 {
        return Ok(vec![merge_partitions(&pieces)?]);
    }
    Ok(pieces)
}

/// Reads piece `piece` of the leaf in `group` at `step`, or of a leaf without steps.
pub fn read_piece(
    group: &Group,
    kind: DataSetKind,
    step: Option<usize>,
    piece: usize,
) -> VtkHdfResult<DataSet> {
    let layout = PieceLayout::resolve(group, kind, step, piece)?;
    Ok(match kind {
        DataSetKind::ImageData => read_image(group, &layout)?.into(),
        DataSetKind::PolyData => {
            let mut poly = PolyData::try_new(read_rows(group, "Points", &layout)?)?;
            for topology in ALL_TOPOLOGIES {
                poly = poly.with_cells(topology, read_cells(group, topology.name(), &layout)?);
            }
            poly.with_attributes(read_attributes(group, &layout, None)?)
                .into()
        }
        DataSetKind::UnstructuredGrid => {
            let types = read_rows(group, "Types", &layout)?;
            let types = types
                .data()
                .values::<u8>()
                .ok_or_else(|| vtkhdf_err!(FormatError: "Types of {} are not bytes", group.path()))?
                .to_vec();
            UnstructuredGrid::try_new(
                read_rows(group, "Points", &layout)?,
                read_cells(group, "", &layout)?,
                types,
            )?
            .with_attributes(read_attributes(group, &layout, None)?)
            .into()
        }
    })
}

fn read_rows(group: &Group, path: &str, layout: &PieceLayout) -> VtkHdfResult<DataArray> {
    read_array_rows(group, path, layout.range(path)?)
}

fn read_cells(group: &Group, prefix: &str, layout: &PieceLayout) -> VtkHdfResult<CellArray> {
    let offsets = read_rows(group, &in_topology(prefix, "Offsets"), layout)?;
    let connectivity = read_rows(group, &in_topology(prefix, "Connectivity"), layout)?;
    CellArray::try_new(offsets.data().to_i64()?, connectivity.data().to_i64()?).map_err(|e| {
        vtkhdf_err!(FormatError: "cells of {}/{prefix} are malformed: {e}", group.path())
    })
}

fn read_image(group: &Group, layout: &PieceLayout) -> VtkHdfResult<ImageData> {
    let mut image = image_geometry(group)?;
    let triple = |name: &str| -> VtkHdfResult<[f64; 3]> {
        let values = get_attribute_floats(group, name, 3)?;
        Ok([values[0], values[1], values[2]])
    };
    image = image.with_origin(triple("Origin")?).with_spacing(triple("Spacing")?);
    if group.has_attribute("Direction")? {
        let values = get_attribute_floats(group, "Direction", 9)?;
        let direction = <[f64; 9]>::try_from(values.as_slice())
            .map_err(|_| vtkhdf_err!(FormatError: "Direction of {} is not nine values", group.path()))?;
        image = image.with_direction(direction);
    }
    let attributes = read_attributes(group, layout, Some(&image))?;
    Ok(image.with_attributes(attributes))
}

/// Reads the arrays `layout` locates; image arrays are read as `[z, y, x]` blocks.
fn read_attributes(
    group: &Group,
    layout: &PieceLayout,
    image: Option<&ImageData>,
) -> VtkHdfResult<Attributes> {
    let mut attributes = Attributes::default();
    for (path, rows) in layout.datasets() {
        let Some(attribute) = path.split_once('/').and_then(|(prefix, _)| {
            ALL_ATTRIBUTE_TYPES
                .into_iter()
                .find(|a| a.group_name() == prefix)
        }) else {
            continue;
        };
        let dims = match (image, attribute) {
            (Some(image), AttributeType::Point) => Some(image.dimensions()),
            (Some(image), AttributeType::Cell) => Some(image.cell_dimensions()),
            _ => None,
        };
        let array = match dims {
            Some([nx, ny, _]) if !rows.is_empty() => new_array_for_group(
                group,
                path,
                &[rows.start, rows.end - 1, 0, ny - 1, 0, nx - 1],
            )?,
            _ => read_array_rows(group, path, rows.clone())?,
        };
        attributes.add(attribute, array)?;
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use vtkhdf_array::DataObject;
    use vtkhdf_container::{ContainerFile, Mode};
    use vtkhdf_error::VtkHdfError;

    use super::*;
    use crate::{VTKHDF_ROOT_PATH, WriteOptions, write, write_time_series};

    fn image() -> ImageData {
        let temperature = DataArray::from_values("T", 1, (0..12).map(f64::from).collect()).unwrap();
        let attributes = Attributes::default()
            .with_array(AttributeType::Point, temperature)
            .unwrap();
        ImageData::try_new([0, 2, 0, 1, 0, 1])
            .unwrap()
            .with_origin([1.0, 2.0, 3.0])
            .with_attributes(attributes)
    }

    #[test]
    fn image_data_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.vtkhdf");
        write(&path, &image().into(), &WriteOptions::default()).unwrap();

        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        let group = file.group(VTKHDF_ROOT_PATH).unwrap();
        assert_eq!(leaf_kind(&group).unwrap(), DataSetKind::ImageData);
        let piece = read_piece(&group, DataSetKind::ImageData, None, 0).unwrap();
        assert_eq!(DataObject::from(piece), DataObject::from(image()));
    }

    #[test]
    fn steps_past_the_end_are_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.vtkhdf");
        let steps = vec![(0.0, image().into()), (1.0, image().into())];
        write_time_series(&path, &steps, &WriteOptions::default()).unwrap();

        let file = ContainerFile::open(&path, Mode::Read).unwrap();
        let group = file.group(VTKHDF_ROOT_PATH).unwrap();
        assert_eq!(
            select_step(&group, &ReadOptions::default().with_step(1)).unwrap(),
            Some(1)
        );
        assert!(matches!(
            select_step(&group, &ReadOptions::default().with_step(2)).unwrap_err(),
            VtkHdfError::RangeError(..)
        ));
    }
}
