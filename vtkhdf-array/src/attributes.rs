use std::fmt::{Display, Formatter};

use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

use crate::DataArray;

/// The element kind an attribute array is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// One tuple per point
    Point,
    /// One tuple per cell
    Cell,
    /// Free-form arrays describing the whole dataset
    Field,
}

/// Every [`AttributeType`], in the order their groups are written.
pub const ALL_ATTRIBUTE_TYPES: [AttributeType; 3] =
    [AttributeType::Point, AttributeType::Cell, AttributeType::Field];

impl AttributeType {
    /// Name of the group holding arrays of this kind.
    pub const fn group_name(self) -> &'static str {
        match self {
            AttributeType::Point => "PointData",
            AttributeType::Cell => "CellData",
            AttributeType::Field => "FieldData",
        }
    }

    /// Name of the group holding per-step offsets of arrays of this kind.
    pub const fn offsets_group_name(self) -> &'static str {
        match self {
            AttributeType::Point => "PointDataOffsets",
            AttributeType::Cell => "CellDataOffsets",
            AttributeType::Field => "FieldDataOffsets",
        }
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group_name())
    }
}

/// The point, cell and field arrays of a dataset.
///
/// Arrays keep their insertion order; names are unique within one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    point: Vec<DataArray>,
    cell: Vec<DataArray>,
    field: Vec<DataArray>,
}

impl Attributes {
    pub fn arrays(&self, kind: AttributeType) -> &[DataArray] {
        match kind {
            AttributeType::Point => &self.point,
            AttributeType::Cell => &self.cell,
            AttributeType::Field => &self.field,
        }
    }

    fn arrays_mut(&mut self, kind: AttributeType) -> &mut Vec<DataArray> {
        match kind {
            AttributeType::Point => &mut self.point,
            AttributeType::Cell => &mut self.cell,
            AttributeType::Field => &mut self.field,
        }
    }

    /// Adds an array, rejecting a name already used by the same kind.
    pub fn add(&mut self, kind: AttributeType, array: DataArray) -> VtkHdfResult<()> {
        if self.get(kind, array.name()).is_some() {
            vtkhdf_bail!("{kind} already holds an array named {}", array.name());
        }
        self.arrays_mut(kind).push(array);
        Ok(())
    }

    /// Builder form of [`Attributes::add`].
    pub fn with_array(mut self, kind: AttributeType, array: DataArray) -> VtkHdfResult<Self> {
        self.add(kind, array)?;
        Ok(self)
    }

    pub fn get(&self, kind: AttributeType, name: &str) -> Option<&DataArray> {
        self.arrays(kind).iter().find(|a| a.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty() && self.cell.is_empty() && self.field.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_per_kind() {
        let pressure = DataArray::from_values("Pressure", 1, vec![1.0f32]).unwrap();
        let mut attributes = Attributes::default()
            .with_array(AttributeType::Point, pressure.clone())
            .unwrap();
        assert!(attributes.add(AttributeType::Point, pressure.clone()).is_err());
        attributes.add(AttributeType::Cell, pressure).unwrap();
        assert_eq!(attributes.arrays(AttributeType::Cell).len(), 1);
        assert!(attributes.get(AttributeType::Field, "Pressure").is_none());
    }
}
