//! Leaf datasets: single meshes with their attribute arrays.

use std::fmt::{Display, Formatter};

use vtkhdf_dtype::{DType, PType, to_usize};
use vtkhdf_error::{VtkHdfExpect, VtkHdfResult, vtkhdf_bail};

use crate::{ArrayData, AttributeType, Attributes, CellArray, DataArray};

/// Name given to the coordinates array of every point set.
pub const POINTS_NAME: &str = "Points";

fn check_points(points: DataArray) -> VtkHdfResult<DataArray> {
    if points.number_of_components() != 3 {
        vtkhdf_bail!(
            "points must have 3 components, not {}",
            points.number_of_components()
        );
    }
    if !points.dtype().is_primitive() {
        vtkhdf_bail!(TypeError: "points cannot hold {} values", points.dtype());
    }
    Ok(points.with_name(POINTS_NAME))
}

fn empty_points() -> DataArray {
    DataArray::try_new(POINTS_NAME, 3, ArrayData::empty(DType::Primitive(PType::F32)))
        .vtkhdf_expect("no values always form whole tuples")
}

/// A cell kind of polygonal data, in the order the kinds are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Vertices = 0,
    Lines = 1,
    Polygons = 2,
    Strips = 3,
}

/// Every [`Topology`], in storage order.
pub const ALL_TOPOLOGIES: [Topology; 4] = [
    Topology::Vertices,
    Topology::Lines,
    Topology::Polygons,
    Topology::Strips,
];

impl Topology {
    pub const fn name(self) -> &'static str {
        match self {
            Topology::Vertices => "Vertices",
            Topology::Lines => "Lines",
            Topology::Polygons => "Polygons",
            Topology::Strips => "Strips",
        }
    }
}

/// A regular grid of points addressed by an integer extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    extent: [i64; 6],
    origin: [f64; 3],
    spacing: [f64; 3],
    direction: [f64; 9],
    attributes: Attributes,
}

impl ImageData {
    /// Creates an image over `extent = [x0, x1, y0, y1, z0, z1]` (inclusive point indices).
    pub fn try_new(extent: [i64; 6]) -> VtkHdfResult<Self> {
        for axis in 0..3 {
            if extent[2 * axis + 1] < extent[2 * axis] {
                vtkhdf_bail!(RangeError: "extent axis {axis} ends before it starts");
            }
        }
        Ok(Self {
            extent,
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            attributes: Attributes::default(),
        })
    }

    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_direction(mut self, direction: [f64; 9]) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn extent(&self) -> [i64; 6] {
        self.extent
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn direction(&self) -> [f64; 9] {
        self.direction
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Number of points along x, y and z.
    pub fn dimensions(&self) -> [usize; 3] {
        let e = self.extent;
        [0, 1, 2].map(|axis| {
            to_usize(e[2 * axis + 1] - e[2 * axis] + 1).unwrap_or_default()
        })
    }

    /// Number of cells along x, y and z. A flat axis counts one cell layer.
    pub fn cell_dimensions(&self) -> [usize; 3] {
        self.dimensions().map(|d| d.saturating_sub(1).max(1))
    }

    pub fn number_of_points(&self) -> usize {
        self.dimensions().iter().product()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cell_dimensions().iter().product()
    }
}

/// Points with vertices, lines, polygons and triangle strips.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyData {
    points: DataArray,
    topologies: [CellArray; 4],
    attributes: Attributes,
}

impl Default for PolyData {
    fn default() -> Self {
        Self {
            points: empty_points(),
            topologies: Default::default(),
            attributes: Attributes::default(),
        }
    }
}

impl PolyData {
    /// Creates polygonal data with no cells over `points`.
    pub fn try_new(points: DataArray) -> VtkHdfResult<Self> {
        Ok(Self {
            points: check_points(points)?,
            ..Self::default()
        })
    }

    pub fn with_cells(mut self, topology: Topology, cells: CellArray) -> Self {
        self.topologies[topology as usize] = cells;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn points(&self) -> &DataArray {
        &self.points
    }

    pub fn cells(&self, topology: Topology) -> &CellArray {
        &self.topologies[topology as usize]
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn number_of_points(&self) -> usize {
        self.points.number_of_tuples()
    }

    /// Total number of cells over every topology.
    pub fn number_of_cells(&self) -> usize {
        self.topologies.iter().map(CellArray::number_of_cells).sum()
    }
}

/// Points with cells of arbitrary type, each tagged with a cell type code.
#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredGrid {
    points: DataArray,
    cells: CellArray,
    types: Vec<u8>,
    attributes: Attributes,
}

impl Default for UnstructuredGrid {
    fn default() -> Self {
        Self {
            points: empty_points(),
            cells: CellArray::default(),
            types: Vec::new(),
            attributes: Attributes::default(),
        }
    }
}

impl UnstructuredGrid {
    /// Creates a grid, checking there is one type code per cell.
    pub fn try_new(points: DataArray, cells: CellArray, types: Vec<u8>) -> VtkHdfResult<Self> {
        if types.len() != cells.number_of_cells() {
            vtkhdf_bail!(
                "{} cell types given for {} cells",
                types.len(),
                cells.number_of_cells()
            );
        }
        Ok(Self {
            points: check_points(points)?,
            cells,
            types,
            attributes: Attributes::default(),
        })
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn points(&self) -> &DataArray {
        &self.points
    }

    pub fn cells(&self) -> &CellArray {
        &self.cells
    }

    pub fn types(&self) -> &[u8] {
        &self.types
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn number_of_points(&self) -> usize {
        self.points.number_of_tuples()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.number_of_cells()
    }
}

/// A single non-composite mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
    ImageData(ImageData),
    PolyData(PolyData),
    UnstructuredGrid(UnstructuredGrid),
}

/// The leaf kinds, without their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSetKind {
    ImageData,
    PolyData,
    UnstructuredGrid,
}

impl Display for DataSetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSetKind::ImageData => write!(f, "ImageData"),
            DataSetKind::PolyData => write!(f, "PolyData"),
            DataSetKind::UnstructuredGrid => write!(f, "UnstructuredGrid"),
        }
    }
}

impl DataSet {
    pub fn kind(&self) -> DataSetKind {
        match self {
            DataSet::ImageData(_) => DataSetKind::ImageData,
            DataSet::PolyData(_) => DataSetKind::PolyData,
            DataSet::UnstructuredGrid(_) => DataSetKind::UnstructuredGrid,
        }
    }

    pub fn number_of_points(&self) -> usize {
        match self {
            DataSet::ImageData(d) => d.number_of_points(),
            DataSet::PolyData(d) => d.number_of_points(),
            DataSet::UnstructuredGrid(d) => d.number_of_points(),
        }
    }

    pub fn number_of_cells(&self) -> usize {
        match self {
            DataSet::ImageData(d) => d.number_of_cells(),
            DataSet::PolyData(d) => d.number_of_cells(),
            DataSet::UnstructuredGrid(d) => d.number_of_cells(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            DataSet::ImageData(d) => &d.attributes,
            DataSet::PolyData(d) => &d.attributes,
            DataSet::UnstructuredGrid(d) => &d.attributes,
        }
    }

    /// Coordinates of a point set; `None` for image data.
    pub fn points(&self) -> Option<&DataArray> {
        match self {
            DataSet::ImageData(_) => None,
            DataSet::PolyData(d) => Some(d.points()),
            DataSet::UnstructuredGrid(d) => Some(d.points()),
        }
    }

    /// Checks that every point and cell array holds one tuple per element.
    pub fn check_attributes(&self) -> VtkHdfResult<()> {
        for (kind, expected) in [
            (AttributeType::Point, self.number_of_points()),
            (AttributeType::Cell, self.number_of_cells()),
        ] {
            for array in self.attributes().arrays(kind) {
                if array.number_of_tuples() != expected {
                    vtkhdf_bail!(
                        "{kind} array {} has {} tuples, expected {expected}",
                        array.name(),
                        array.number_of_tuples()
                    );
                }
            }
        }
        Ok(())
    }
}

impl From<ImageData> for DataSet {
    fn from(value: ImageData) -> Self {
        DataSet::ImageData(value)
    }
}

impl From<PolyData> for DataSet {
    fn from(value: PolyData) -> Self {
        DataSet::PolyData(value)
    }
}

impl From<UnstructuredGrid> for DataSet {
    fn from(value: UnstructuredGrid) -> Self {
        DataSet::UnstructuredGrid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> UnstructuredGrid {
        let points =
            DataArray::from_values("coords", 3, vec![0.0f64, 0., 0., 1., 0., 0., 0., 1., 0.])
                .unwrap();
        let cells = CellArray::from_cells([[0i64, 1, 2]]).unwrap();
        UnstructuredGrid::try_new(points, cells, vec![5]).unwrap()
    }

    #[test]
    fn points_are_renamed() {
        assert_eq!(triangle().points().name(), POINTS_NAME);
    }

    #[test]
    fn one_type_per_cell() {
        let grid = triangle();
        assert!(
            UnstructuredGrid::try_new(grid.points().clone(), grid.cells().clone(), vec![]).is_err()
        );
    }

    #[test]
    fn attribute_counts_are_checked() {
        let attributes = Attributes::default()
            .with_array(
                AttributeType::Cell,
                DataArray::from_values("id", 1, vec![1i32, 2]).unwrap(),
            )
            .unwrap();
        let grid = DataSet::from(triangle().with_attributes(attributes));
        assert!(grid.check_attributes().is_err());
    }

    #[test]
    fn image_dimensions() {
        let image = ImageData::try_new([0, 3, 0, 2, 0, 0]).unwrap();
        assert_eq!(image.dimensions(), [4, 3, 1]);
        assert_eq!(image.cell_dimensions(), [3, 2, 1]);
        assert_eq!(image.number_of_cells(), 6);
        assert!(ImageData::try_new([0, -1, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn poly_data_counts_every_topology() {
        let poly = PolyData::default()
            .with_cells(Topology::Vertices, CellArray::from_cells([[0i64]]).unwrap())
            .with_cells(Topology::Strips, CellArray::from_cells([[0i64, 1, 2, 3]]).unwrap());
        assert_eq!(poly.number_of_cells(), 2);
        assert_eq!(poly.number_of_points(), 0);
    }
}
