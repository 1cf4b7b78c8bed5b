use vtkhdf_dtype::{to_index, to_usize};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// Cells stored as flat connectivity plus `cells + 1` offsets into it.
///
/// Cell `i` is made of the point ids `connectivity[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellArray {
    offsets: Vec<i64>,
    connectivity: Vec<i64>,
}

impl Default for CellArray {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            connectivity: Vec::new(),
        }
    }
}

impl CellArray {
    /// Creates a cell array from its raw parts.
    ///
    /// The offsets must start at 0, never decrease, and end at the length of the connectivity.
    pub fn try_new(offsets: Vec<i64>, connectivity: Vec<i64>) -> VtkHdfResult<Self> {
        match offsets.first() {
            Some(0) => {}
            Some(first) => vtkhdf_bail!("cell offsets must start at 0, not {first}"),
            None => vtkhdf_bail!("cell offsets must hold at least one entry"),
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            vtkhdf_bail!("cell offsets must not decrease");
        }
        let last = offsets.last().copied().unwrap_or_default();
        if to_usize(last)? != connectivity.len() {
            vtkhdf_bail!(
                "cell offsets end at {last} but the connectivity holds {} ids",
                connectivity.len()
            );
        }
        Ok(Self {
            offsets,
            connectivity,
        })
    }

    /// Builds a cell array from the point ids of each cell.
    pub fn from_cells<I, C>(cells: I) -> VtkHdfResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[i64]>,
    {
        let mut result = Self::default();
        for cell in cells {
            result.connectivity.extend_from_slice(cell.as_ref());
            result.offsets.push(to_index(result.connectivity.len())?);
        }
        Ok(result)
    }

    pub fn number_of_cells(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn number_of_connectivity_ids(&self) -> usize {
        self.connectivity.len()
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    pub fn connectivity(&self) -> &[i64] {
        &self.connectivity
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_cells() == 0
    }

    /// The point ids of cell `index`.
    pub fn cell(&self, index: usize) -> Option<&[i64]> {
        let start = to_usize(*self.offsets.get(index)?).ok()?;
        let end = to_usize(*self.offsets.get(index + 1)?).ok()?;
        self.connectivity.get(start..end)
    }

    /// Appends the cells of `other`, shifting their point ids by `point_shift`.
    pub fn append(&mut self, other: &CellArray, point_shift: i64) -> VtkHdfResult<()> {
        let base = to_index(self.connectivity.len())?;
        self.offsets
            .extend(other.offsets.iter().skip(1).map(|o| o + base));
        self.connectivity
            .extend(other.connectivity.iter().map(|id| id + point_shift));
        Ok(())
    }
}
