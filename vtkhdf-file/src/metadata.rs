//! Typed access to the attributes and integer index datasets of a VTKHDF group.

use vtkhdf_array::{ArrayData, AttributeType};
use vtkhdf_container::{AttributeValue, Dataset, Group, Hyperslab, NodeKind};
use vtkhdf_dtype::{Index, NativeType, encode_le, to_usize};
use vtkhdf_error::{VtkHdfError, VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::require_dataset;

/// Field array sizes reported when a step records none: unknown components, one tuple.
pub const DEFAULT_FIELD_ARRAY_SIZE: [Index; 2] = [-1, 1];

/// Anything the per-step index values can be read from.
pub trait MetadataSource {
    /// Reads `size` rows of the integer dataset `name` starting at row `offset`.
    ///
    /// Two-dimensional datasets yield their rows flattened, so `size` rows of a `[n, 2]` dataset
    /// give `2 * size` values.
    fn get_metadata(&self, name: &str, size: usize, offset: usize) -> VtkHdfResult<Vec<Index>>;
}

impl MetadataSource for Group {
    fn get_metadata(&self, name: &str, size: usize, offset: usize) -> VtkHdfResult<Vec<Index>> {
        get_metadata(self, name, size, offset)
    }
}

fn attribute_mismatch(group: &Group, name: &str, expected: &str) -> VtkHdfError {
    vtkhdf_err!(TypeError: "attribute {name} of {} does not hold {expected}", group.path())
}

/// Reads an integer attribute that must hold exactly `count` values.
pub fn get_attribute_ints(group: &Group, name: &str, count: usize) -> VtkHdfResult<Vec<Index>> {
    let value = group.attribute(name)?;
    let values = value
        .as_ints()
        .ok_or_else(|| attribute_mismatch(group, name, "integers"))?;
    if values.len() != count {
        vtkhdf_bail!(
            RangeError: "attribute {name} of {} holds {} values, expected {count}",
            group.path(),
            values.len()
        );
    }
    Ok(values.to_vec())
}

/// Reads a floating point attribute that must hold exactly `count` values.
pub fn get_attribute_floats(group: &Group, name: &str, count: usize) -> VtkHdfResult<Vec<f64>> {
    let value = group.attribute(name)?;
    let values = value
        .as_floats()
        .ok_or_else(|| attribute_mismatch(group, name, "doubles"))?;
    if values.len() != count {
        vtkhdf_bail!(
            RangeError: "attribute {name} of {} holds {} values, expected {count}",
            group.path(),
            values.len()
        );
    }
    Ok(values.to_vec())
}

pub fn get_attribute_str(group: &Group, name: &str) -> VtkHdfResult<String> {
    group
        .attribute(name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| attribute_mismatch(group, name, "a string"))
}

pub fn set_attribute(group: &Group, name: &str, value: impl Into<AttributeValue>) -> VtkHdfResult<()> {
    group.set_attribute(name, value)
}

/// Number of leading-axis rows of the dataset `name`, or zero when it does not exist.
pub fn dataset_rows(group: &Group, name: &str) -> VtkHdfResult<usize> {
    match group.child_kind(name)? {
        Some(NodeKind::Dataset) => Ok(group.open_dataset(name)?.dims()?[0]),
        _ => Ok(0),
    }
}

/// Reads `size` rows of the integer dataset `name` starting at row `offset`, flattened.
///
/// A missing dataset is `NotFound`; rows outside its extent are a `RangeError`.
pub fn get_metadata(group: &Group, name: &str, size: usize, offset: usize) -> VtkHdfResult<Vec<Index>> {
    let dataset = group.open_dataset(name)?;
    let dims = dataset.dims()?;
    if dims.len() > 2 {
        vtkhdf_bail!(FormatError: "index dataset {} has rank {}", dataset.path(), dims.len());
    }
    let slab = Hyperslab::rows(offset..offset + size, &dims[1..]);
    read_integers(&dataset, &slab)
}

pub(crate) fn read_integers(dataset: &Dataset, slab: &Hyperslab) -> VtkHdfResult<Vec<Index>> {
    let ptype = dataset.dtype()?.ptype()?;
    if !ptype.is_int() {
        vtkhdf_bail!(TypeError: "{} holds {ptype} values, not integers", dataset.path());
    }
    ArrayData::from_le_bytes(ptype, &dataset.read(slab)?)?.to_i64()
}

/// Appends integer rows to the dataset `name`, creating it with rows of shape `inner_dims`.
///
/// Returns the index of the first appended row.
pub fn append_metadata(
    group: &Group,
    name: &str,
    values: &[Index],
    inner_dims: &[usize],
) -> VtkHdfResult<usize> {
    require_dataset(group, name, NativeType::LLong, inner_dims, None)?.append_values(values)
}

/// Overwrites integer rows of the dataset `name` from row `offset` on.
pub fn set_metadata_slice(group: &Group, name: &str, offset: usize, values: &[Index]) -> VtkHdfResult<()> {
    let dataset = group.open_dataset(name)?;
    if dataset.dtype()? != NativeType::LLong {
        vtkhdf_bail!(TypeError: "{} is not an index dataset", dataset.path());
    }
    dataset.write_rows(offset, &encode_le(values))
}

/// The current shape of a dataset.
pub fn get_dimensions(dataset: &Dataset) -> VtkHdfResult<Vec<usize>> {
    dataset.dims()
}

/// Number of time steps recorded below `group`, zero when it is not temporal.
pub fn get_number_of_steps(group: &Group) -> VtkHdfResult<usize> {
    if group.child_kind("Steps")? != Some(NodeKind::Group) {
        return Ok(0);
    }
    let steps = group.open_group("Steps")?;
    if !steps.has_attribute("NSteps")? {
        return Ok(0);
    }
    to_usize(get_attribute_ints(&steps, "NSteps", 1)?[0])
}

/// Names of the children of `group`, in the order they were written.
pub fn get_ordered_children(group: &Group) -> VtkHdfResult<Vec<String>> {
    group.children()
}

/// Names of the arrays of one attribute kind stored below `group`, in the order they were
/// written. Empty when the attribute group does not exist.
pub fn get_array_names(group: &Group, kind: AttributeType) -> VtkHdfResult<Vec<String>> {
    if group.child_kind(kind.group_name())? != Some(NodeKind::Group) {
        return Ok(Vec::new());
    }
    let arrays = group.open_group(kind.group_name())?;
    arrays
        .children()?
        .into_iter()
        .filter_map(|name| match arrays.child_kind(&name) {
            Ok(Some(NodeKind::Dataset)) => Some(Ok(name)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// The `[components, tuples]` of field array `name` at `step`.
///
/// Returns [`DEFAULT_FIELD_ARRAY_SIZE`] when the step records no size for the array.
pub fn get_field_array_size(group: &Group, step: usize, name: &str) -> VtkHdfResult<[Index; 2]> {
    let path = format!("Steps/FieldDataSizes/{name}");
    if group.child_kind(&path)? != Some(NodeKind::Dataset) {
        return Ok(DEFAULT_FIELD_ARRAY_SIZE);
    }
    match get_metadata(group, &path, 1, step)?.as_slice() {
        [components, tuples] => Ok([*components, *tuples]),
        other => Err(vtkhdf_err!(
            FormatError: "field data size of {name} holds {} values",
            other.len()
        )),
    }
}

/// The offset, in tuples, of array `name` at `step`, or `None` when the step records none.
pub fn get_array_offset(
    group: &Group,
    step: usize,
    kind: AttributeType,
    name: &str,
) -> VtkHdfResult<Option<Index>> {
    let path = format!("Steps/{}/{name}", kind.offsets_group_name());
    if group.child_kind(&path)? != Some(NodeKind::Dataset) {
        return Ok(None);
    }
    Ok(get_metadata(group, &path, 1, step)?.first().copied())
}

/// Sum of a run of per-piece counts, as a size.
pub(crate) fn sum_sizes(values: &[Index]) -> VtkHdfResult<usize> {
    values
        .iter()
        .try_fold(0usize, |acc, v| {
            acc.checked_add(to_usize(*v)?)
                .ok_or_else(|| vtkhdf_err!(FormatError: "piece counts overflow a size"))
        })
}
