use std::ops::Range;

use vtkhdf_dtype::DType;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::{ArrayData, NativeArray};

/// A named array of fixed-size tuples.
///
/// Values are stored tuple-major: component `c` of tuple `t` lives at `t * components + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    name: String,
    number_of_components: usize,
    data: ArrayData,
}

impl DataArray {
    /// Creates a new array, checking that the values form whole tuples.
    pub fn try_new(
        name: impl Into<String>,
        number_of_components: usize,
        data: ArrayData,
    ) -> VtkHdfResult<Self> {
        let name = name.into();
        if number_of_components == 0 {
            vtkhdf_bail!("array {name} must have at least one component");
        }
        if data.len() % number_of_components != 0 {
            vtkhdf_bail!(
                "array {name} has {} values, not a whole number of {number_of_components}-tuples",
                data.len()
            );
        }
        Ok(Self {
            name,
            number_of_components,
            data,
        })
    }

    /// Creates a new array from native values.
    pub fn from_values<T: NativeArray>(
        name: impl Into<String>,
        number_of_components: usize,
        values: Vec<T>,
    ) -> VtkHdfResult<Self> {
        Self::try_new(name, number_of_components, ArrayData::from_values(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of this array under a different name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    pub fn number_of_tuples(&self) -> usize {
        self.data.len() / self.number_of_components
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Component `component` of tuple `tuple`, widened to a double.
    pub fn component(&self, tuple: usize, component: usize) -> Option<f64> {
        if component >= self.number_of_components {
            return None;
        }
        self.data
            .get_f64(tuple * self.number_of_components + component)
    }

    /// Overwrites component `component` of tuple `tuple`.
    pub fn set_component(&mut self, tuple: usize, component: usize, value: f64) -> VtkHdfResult<()> {
        if component >= self.number_of_components {
            vtkhdf_bail!(OutOfBounds: component, 0, self.number_of_components);
        }
        self.data
            .set_f64(tuple * self.number_of_components + component, value)
    }

    /// A copy of the tuples in `range`.
    pub fn tuples(&self, range: Range<usize>) -> VtkHdfResult<DataArray> {
        let n = self.number_of_components;
        let data = self.data.slice(range.start * n..range.end * n)?;
        Ok(Self {
            name: self.name.clone(),
            number_of_components: n,
            data,
        })
    }

    /// Appends the tuples of `other`, which must have the same element type and tuple size.
    pub fn append(&mut self, other: &DataArray) -> VtkHdfResult<()> {
        if other.number_of_components != self.number_of_components {
            return Err(vtkhdf_err!(
                "cannot append {}-component tuples to {}-component array {}",
                other.number_of_components,
                self.number_of_components,
                self.name
            ));
        }
        self.data.extend_from(&other.data)
    }
}
