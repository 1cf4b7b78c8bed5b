use std::ops::Range;

use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// A rectangular selection within a dataset: `count[i]` elements from `start[i]` on every axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    start: Vec<usize>,
    count: Vec<usize>,
}

impl Hyperslab {
    pub fn new(start: Vec<usize>, count: Vec<usize>) -> Self {
        Self { start, count }
    }

    /// Selects a whole dataset of shape `dims`.
    pub fn all(dims: &[usize]) -> Self {
        Self::new(vec![0; dims.len()], dims.to_vec())
    }

    /// Selects the leading-axis rows `rows`, with every element of the inner axes.
    pub fn rows(rows: Range<usize>, inner_dims: &[usize]) -> Self {
        let mut start = vec![0; inner_dims.len() + 1];
        start[0] = rows.start;
        let mut count = Vec::with_capacity(inner_dims.len() + 1);
        count.push(rows.len());
        count.extend_from_slice(inner_dims);
        Self { start, count }
    }

    pub fn start(&self) -> &[usize] {
        &self.start
    }

    pub fn count(&self) -> &[usize] {
        &self.count
    }

    pub fn num_elements(&self) -> usize {
        self.count.iter().product()
    }

    pub(crate) fn leading_rows(&self) -> Range<usize> {
        let start = self.start.first().copied().unwrap_or_default();
        start..start + self.count.first().copied().unwrap_or_default()
    }

    /// Checks that the selection lies within `dims`.
    pub fn check(&self, dims: &[usize]) -> VtkHdfResult<()> {
        if self.start.len() != dims.len() || self.count.len() != dims.len() {
            vtkhdf_bail!(
                RangeError: "selection of rank {} on a dataset of rank {}",
                self.start.len(),
                dims.len()
            );
        }
        for (axis, ((start, count), dim)) in self.start.iter().zip(&self.count).zip(dims).enumerate() {
            match start.checked_add(*count) {
                Some(end) if end <= *dim => {}
                _ => vtkhdf_bail!(
                    RangeError: "axis {axis}: selection {start}+{count} exceeds extent {dim}"
                ),
            }
        }
        Ok(())
    }

    /// Copies the selected elements out of `rows`, which holds the selected leading-axis rows in
    /// full.
    pub(crate) fn gather(&self, rows: &[u8], dims: &[usize], width: usize) -> Vec<u8> {
        let rank = dims.len();
        let whole_rows = self.start.iter().skip(1).all(|s| *s == 0)
            && self.count.iter().skip(1).eq(dims.iter().skip(1));
        if rank <= 1 || whole_rows {
            return rows.to_vec();
        }

        let mut out = Vec::with_capacity(self.num_elements() * width);
        if self.num_elements() == 0 {
            return out;
        }
        let mut strides = vec![1usize; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }

        let last = rank - 1;
        let run = self.count[last] * width;
        let mut index = vec![0usize; rank];
        loop {
            let offset: usize = (0..rank)
                .map(|axis| {
                    let base = if axis == 0 { 0 } else { self.start[axis] };
                    (base + index[axis]) * strides[axis]
                })
                .sum();
            out.extend_from_slice(&rows[offset * width..offset * width + run]);

            // Advance over every axis but the contiguous last one.
            let mut axis = last;
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < self.count[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
}
