//! Moving typed arrays between memory and the datasets of a group.

use std::ops::Range;

use vtkhdf_array::{ArrayData, DataArray};
use vtkhdf_container::{Dataset, Group, Hyperslab, NodeKind};
use vtkhdf_dtype::{NativeType, PType};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

/// Last component of a dataset path.
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Opens the parent group of `path`, creating missing groups on the way.
fn require_parent<'a>(group: &Group, path: &'a str) -> VtkHdfResult<(Group, &'a str)> {
    let mut parts = path.split('/').filter(|p| !p.is_empty()).collect::<Vec<_>>();
    let name = parts
        .pop()
        .ok_or_else(|| vtkhdf_err!("empty dataset path"))?;
    let mut parent = group.open_group("")?;
    for part in parts {
        parent = parent.require_group(part)?;
    }
    Ok((parent, name))
}

/// The element type an array is stored as; arrays without one cannot be written.
pub fn native_type_of(array: &DataArray) -> VtkHdfResult<NativeType> {
    let native = NativeType::from_dtype(&array.dtype());
    if !native.is_valid() {
        vtkhdf_bail!(
            TypeError: "array {} holds {} values, which have no stored type",
            array.name(),
            array.dtype()
        );
    }
    Ok(native)
}

/// The shape of one row of a one-row-per-tuple dataset holding `array`.
pub fn tuple_dims(array: &DataArray) -> Vec<usize> {
    match array.number_of_components() {
        1 => Vec::new(),
        n => vec![n],
    }
}

/// Opens dataset `path` below `group`, creating it when missing.
///
/// An existing dataset must hold `dtype` elements in rows of shape `inner_dims`.
pub fn require_dataset(
    group: &Group,
    path: &str,
    dtype: NativeType,
    inner_dims: &[usize],
    compression: Option<u32>,
) -> VtkHdfResult<Dataset> {
    match group.child_kind(path)? {
        Some(NodeKind::Dataset) => {
            let dataset = group.open_dataset(path)?;
            let stored = dataset.dtype()?;
            if stored != dtype {
                vtkhdf_bail!(
                    TypeError: "{} holds {stored} elements, cannot store {dtype}",
                    dataset.path()
                );
            }
            let dims = dataset.dims()?;
            if dims[1..] != *inner_dims {
                vtkhdf_bail!(
                    "{} rows do not match the shape of the new data",
                    dataset.path()
                );
            }
            Ok(dataset)
        }
        Some(NodeKind::Group) => Err(vtkhdf_err!("{path} is a group, not a dataset")),
        None => {
            let (parent, name) = require_parent(group, path)?;
            parent.new_dataset(name, dtype, inner_dims, compression)
        }
    }
}

/// Appends the values of `array` to dataset `path` as rows of shape `inner_dims`.
///
/// The element type is checked before any storage is allocated. Returns the first new row.
pub fn append_array(
    group: &Group,
    path: &str,
    array: &DataArray,
    inner_dims: &[usize],
    compression: Option<u32>,
) -> VtkHdfResult<usize> {
    let dtype = native_type_of(array)?;
    let dataset = require_dataset(group, path, dtype, inner_dims, compression)?;
    dataset.append(&array.data().to_le_bytes()?)
}

/// Overwrites rows of dataset `path` from `row` on with the values of `array`.
pub fn write_array_at(group: &Group, path: &str, array: &DataArray, row: usize) -> VtkHdfResult<()> {
    let dataset = group.open_dataset(path)?;
    let dtype = native_type_of(array)?;
    if dataset.dtype()? != dtype {
        vtkhdf_bail!(TypeError: "{} does not hold {dtype} elements", dataset.path());
    }
    dataset.write_rows(row, &array.data().to_le_bytes()?)
}

fn element_type(dataset: &Dataset) -> VtkHdfResult<PType> {
    dataset
        .dtype()?
        .ptype()
        .map_err(|e| e.with_context(format!("reading {}", dataset.path())))
}

fn read_array(dataset: &Dataset, ptype: PType, slab: &Hyperslab, components: usize) -> VtkHdfResult<DataArray> {
    let data = ArrayData::from_le_bytes(ptype, &dataset.read(slab)?)?;
    DataArray::try_new(base_name(dataset.path()), components, data)
}

/// Reads dataset `path` below `group` into a new array.
///
/// `extent` selects what is read, as inclusive `[start, end]` pairs of dataset indices:
///
/// - empty: the whole dataset, one tuple per row,
/// - one pair per axis: the selected elements as single-component tuples,
/// - one pair per axis but the last: the selected tuples, with the last axis as components.
///
/// The element type is checked before anything is read, and the selection against the
/// dataset's extent.
pub fn new_array_for_group(group: &Group, path: &str, extent: &[usize]) -> VtkHdfResult<DataArray> {
    let dataset = group.open_dataset(path)?;
    let ptype = element_type(&dataset)?;
    let dims = dataset.dims()?;

    if extent.is_empty() {
        let components = match dims.as_slice() {
            [_] => 1,
            [_, components] => *components,
            _ => vtkhdf_bail!(
                RangeError: "{} has rank {}, an extent is needed to read it",
                dataset.path(),
                dims.len()
            ),
        };
        return read_array(&dataset, ptype, &Hyperslab::all(&dims), components);
    }

    if extent.len() % 2 != 0 {
        vtkhdf_bail!("an extent holds pairs of indices, got {} values", extent.len());
    }
    let pairs = extent.len() / 2;
    let components = if pairs == dims.len() {
        1
    } else if pairs + 1 == dims.len() {
        dims[pairs]
    } else {
        vtkhdf_bail!(
            RangeError: "an extent of {pairs} axes cannot address {} of rank {}",
            dataset.path(),
            dims.len()
        );
    };

    let mut start = Vec::with_capacity(dims.len());
    let mut count = Vec::with_capacity(dims.len());
    for pair in extent.chunks_exact(2) {
        if pair[1] < pair[0] {
            vtkhdf_bail!(RangeError: "extent {}..={} is reversed", pair[0], pair[1]);
        }
        let rows = (pair[1] - pair[0]).checked_add(1).ok_or_else(|| {
            vtkhdf_err!(RangeError: "extent {}..={} cannot be addressed", pair[0], pair[1])
        })?;
        start.push(pair[0]);
        count.push(rows);
    }
    if pairs < dims.len() {
        start.push(0);
        count.push(components);
    }
    let slab = Hyperslab::new(start, count);
    slab.check(&dims)?;
    read_array(&dataset, ptype, &slab, components)
}

/// Reads rows `rows` of a one-row-per-tuple dataset.
pub fn read_array_rows(group: &Group, path: &str, rows: Range<usize>) -> VtkHdfResult<DataArray> {
    let dataset = group.open_dataset(path)?;
    let ptype = element_type(&dataset)?;
    let dims = dataset.dims()?;
    let components = match dims.as_slice() {
        [_] => 1,
        [_, components] => *components,
        _ => vtkhdf_bail!(FormatError: "{} has rank {}", dataset.path(), dims.len()),
    };
    read_array(&dataset, ptype, &Hyperslab::rows(rows, &dims[1..]), components)
}
