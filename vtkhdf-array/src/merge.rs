//! Concatenation of the pieces of a partitioned dataset into one dataset.
//!
//! Elements keep their piece order: every point and cell of piece 0 precedes those of piece 1.
//! Nothing is deduplicated. Polygonal cells are concatenated per topology, so all vertices come
//! before all lines, and the cell arrays follow the same order.

use itertools::Itertools;
use vtkhdf_dtype::to_index;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

use crate::{
    ALL_TOPOLOGIES, AttributeType, Attributes, CellArray, DataArray, DataSet, DataSetKind,
    PolyData, UnstructuredGrid,
};

/// Merges `partitions` into a single dataset.
///
/// All pieces must be of the same kind and carry the same point and cell arrays. Field data is
/// taken from the first piece. Image data cannot be merged beyond a single piece.
pub fn merge_partitions(partitions: &[DataSet]) -> VtkHdfResult<DataSet> {
    match partitions {
        [] => return Ok(UnstructuredGrid::default().into()),
        [single] => return Ok(single.clone()),
        _ => {}
    }
    if !partitions.iter().map(DataSet::kind).all_equal() {
        vtkhdf_bail!(
            "cannot merge pieces of kinds {}",
            partitions.iter().map(DataSet::kind).unique().join(", ")
        );
    }
    for piece in partitions {
        piece.check_attributes()?;
    }

    match partitions[0].kind() {
        DataSetKind::ImageData => {
            vtkhdf_bail!("cannot merge {} image data pieces", partitions.len())
        }
        DataSetKind::UnstructuredGrid => merge_grids(&leaves(partitions, |p| match p {
            DataSet::UnstructuredGrid(g) => Some(g),
            _ => None,
        }))
        .map(DataSet::from),
        DataSetKind::PolyData => merge_poly_data(&leaves(partitions, |p| match p {
            DataSet::PolyData(g) => Some(g),
            _ => None,
        }))
        .map(DataSet::from),
    }
}

fn leaves<'a, T>(partitions: &'a [DataSet], f: impl Fn(&'a DataSet) -> Option<&'a T>) -> Vec<&'a T> {
    partitions.iter().filter_map(f).collect()
}

fn merge_points<'a>(mut points: impl Iterator<Item = &'a DataArray>) -> VtkHdfResult<DataArray> {
    let Some(first) = points.next() else {
        return Ok(PolyData::default().points().clone());
    };
    let mut merged = first.clone();
    for next in points {
        merged.append(next)?;
    }
    Ok(merged)
}

fn concat_arrays(kind: AttributeType, chunks: &[Vec<DataArray>]) -> VtkHdfResult<Vec<DataArray>> {
    let Some((first, rest)) = chunks.split_first() else {
        return Ok(Vec::new());
    };
    let mut merged = first.clone();
    for chunk in rest {
        let same_names = chunk.len() == merged.len()
            && merged.iter().zip(chunk).all(|(a, b)| a.name() == b.name());
        if !same_names {
            vtkhdf_bail!(
                "pieces disagree on their {kind} arrays: [{}] vs [{}]",
                merged.iter().map(DataArray::name).join(", "),
                chunk.iter().map(DataArray::name).join(", ")
            );
        }
        for (into, from) in merged.iter_mut().zip(chunk) {
            into.append(from)?;
        }
    }
    Ok(merged)
}

fn build_attributes(
    point: Vec<DataArray>,
    cell: Vec<DataArray>,
    field: &[DataArray],
) -> VtkHdfResult<Attributes> {
    let mut attributes = Attributes::default();
    for (kind, arrays) in [
        (AttributeType::Point, point),
        (AttributeType::Cell, cell),
        (AttributeType::Field, field.to_vec()),
    ] {
        for array in arrays {
            attributes.add(kind, array)?;
        }
    }
    Ok(attributes)
}

fn point_chunks<'a>(attributes: impl Iterator<Item = &'a Attributes>) -> Vec<Vec<DataArray>> {
    attributes
        .map(|a| a.arrays(AttributeType::Point).to_vec())
        .collect()
}

fn merge_grids(grids: &[&UnstructuredGrid]) -> VtkHdfResult<UnstructuredGrid> {
    let points = merge_points(grids.iter().map(|g| g.points()))?;

    let mut cells = CellArray::default();
    let mut types = Vec::new();
    let mut shift = 0usize;
    for grid in grids {
        cells.append(grid.cells(), to_index(shift)?)?;
        types.extend_from_slice(grid.types());
        shift += grid.number_of_points();
    }

    let cell_chunks: Vec<_> = grids
        .iter()
        .map(|g| g.attributes().arrays(AttributeType::Cell).to_vec())
        .collect();
    let attributes = build_attributes(
        concat_arrays(
            AttributeType::Point,
            &point_chunks(grids.iter().map(|g| g.attributes())),
        )?,
        concat_arrays(AttributeType::Cell, &cell_chunks)?,
        grids
            .first()
            .map(|g| g.attributes().arrays(AttributeType::Field))
            .unwrap_or_default(),
    )?;

    Ok(UnstructuredGrid::try_new(points, cells, types)?.with_attributes(attributes))
}

fn merge_poly_data(pieces: &[&PolyData]) -> VtkHdfResult<PolyData> {
    let points = merge_points(pieces.iter().map(|p| p.points()))?;
    let mut merged = PolyData::try_new(points)?;

    let shifts: Vec<i64> = pieces
        .iter()
        .scan(0usize, |acc, p| {
            let shift = *acc;
            *acc += p.number_of_points();
            Some(shift)
        })
        .map(to_index)
        .try_collect()?;

    // Cell arrays of each piece are laid out per topology, in topology order.
    let mut cell_starts = vec![0usize; pieces.len()];
    let mut cell_chunks: Vec<Vec<DataArray>> = Vec::new();
    for topology in ALL_TOPOLOGIES {
        let mut cells = CellArray::default();
        for (index, piece) in pieces.iter().enumerate() {
            let piece_cells = piece.cells(topology);
            cells.append(piece_cells, shifts[index])?;

            let start = cell_starts[index];
            let end = start + piece_cells.number_of_cells();
            cell_chunks.push(
                piece
                    .attributes()
                    .arrays(AttributeType::Cell)
                    .iter()
                    .map(|a| a.tuples(start..end))
                    .try_collect()?,
            );
            cell_starts[index] = end;
        }
        merged = merged.with_cells(topology, cells);
    }

    let attributes = build_attributes(
        concat_arrays(
            AttributeType::Point,
            &point_chunks(pieces.iter().map(|p| p.attributes())),
        )?,
        concat_arrays(AttributeType::Cell, &cell_chunks)?,
        pieces
            .first()
            .map(|p| p.attributes().arrays(AttributeType::Field))
            .unwrap_or_default(),
    )?;
    Ok(merged.with_attributes(attributes))
}
