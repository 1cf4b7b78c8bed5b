//! Appending the pieces of one leaf dataset to a leaf group, one time step at a time.
//!
//! Every call appends a step after the data already in the group. Geometry and arrays that did
//! not change since the previous step are not stored again: the step's offsets point at the
//! previous copy instead.

use itertools::Itertools;
use log::{debug, trace};
use vtkhdf_array::{
    ALL_ATTRIBUTE_TYPES, ALL_TOPOLOGIES, AttributeType, CellArray, DataArray, DataSet, DataSetKind,
    ImageData,
};
use vtkhdf_container::Group;
use vtkhdf_dtype::{Index, NativeType, to_index};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::offsets::{array_path, in_topology, topology_prefixes};
use crate::{
    DataSetType, GeometryOffsets, PieceLayout, VTKHDF_ROOT_PATH, append_metadata, dataset_rows,
    native_type_of, require_dataset, set_attribute, tuple_dims,
};

/// Where the data of a piece already lives in a sibling file.
#[derive(Debug, Clone)]
pub(crate) struct PartLink {
    /// Name of the sibling, relative to the main file
    pub(crate) file: String,
    pub(crate) layout: PieceLayout,
}

/// One piece of a leaf, with its data stored inline or linked from a sibling file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Piece<'a> {
    pub(crate) data: &'a DataSet,
    pub(crate) link: Option<&'a PartLink>,
}

impl<'a> Piece<'a> {
    pub(crate) fn inline(data: &'a DataSet) -> Self {
        Self { data, link: None }
    }
}

/// What every step of a leaf must agree on.
#[derive(Debug, Clone, PartialEq)]
struct LeafShape {
    kind: DataSetKind,
    temporal: bool,
    arrays: Vec<(AttributeType, String)>,
    /// Geometry of image data, without arrays
    image: Option<ImageData>,
}

impl LeafShape {
    fn describe(pieces: &[Piece<'_>], temporal: bool) -> VtkHdfResult<Self> {
        let kinds = pieces.iter().map(|p| p.data.kind()).unique().collect::<Vec<_>>();
        let kind = match kinds.as_slice() {
            [] => DataSetKind::UnstructuredGrid,
            [kind] => *kind,
            _ => vtkhdf_bail!("the pieces of a leaf mix kinds {}", kinds.iter().join(", ")),
        };
        let image = match pieces {
            [Piece {
                data: DataSet::ImageData(image),
                ..
            }] => Some(bare_image(image)?),
            _ if kind == DataSetKind::ImageData => {
                vtkhdf_bail!("image data is written as one piece, not {}", pieces.len())
            }
            _ => None,
        };

        let mut arrays = Vec::new();
        for (i, piece) in pieces.iter().enumerate() {
            piece
                .data
                .check_attributes()
                .map_err(|e| e.with_context(format!("piece {i}")))?;
            let attributes = piece.data.attributes();
            if i == 0 {
                for attribute in ALL_ATTRIBUTE_TYPES {
                    for array in attributes.arrays(attribute) {
                        native_type_of(array)?;
                        arrays.push((attribute, array.name().to_string()));
                    }
                }
                continue;
            }
            if !attributes.arrays(AttributeType::Field).is_empty() {
                vtkhdf_bail!("field data is stored with the first piece, piece {i} carries some too");
            }
            for attribute in [AttributeType::Point, AttributeType::Cell] {
                let expected = arrays
                    .iter()
                    .filter(|(a, _)| *a == attribute)
                    .map(|(_, name)| name.as_str());
                if !expected.eq(attributes.arrays(attribute).iter().map(DataArray::name)) {
                    vtkhdf_bail!("piece {i} does not carry the {attribute} arrays of piece 0");
                }
            }
        }

        Ok(Self {
            kind,
            temporal,
            arrays,
            image,
        })
    }

    fn check_continues(&self, next: &LeafShape) -> VtkHdfResult<()> {
        if self.kind != next.kind {
            vtkhdf_bail!("a {} leaf cannot continue with {} pieces", self.kind, next.kind);
        }
        if self.temporal != next.temporal {
            vtkhdf_bail!(SequenceError: "a leaf cannot mix time steps with plain writes");
        }
        if self.arrays != next.arrays {
            vtkhdf_bail!(
                "arrays changed from [{}] to [{}]",
                self.arrays.iter().map(|(a, n)| format!("{a}/{n}")).join(", "),
                next.arrays.iter().map(|(a, n)| format!("{a}/{n}")).join(", ")
            );
        }
        if self.image != next.image {
            vtkhdf_bail!("the image geometry changed between steps");
        }
        Ok(())
    }
}

fn bare_image(image: &ImageData) -> VtkHdfResult<ImageData> {
    Ok(ImageData::try_new(image.extent())?
        .with_origin(image.origin())
        .with_spacing(image.spacing())
        .with_direction(image.direction()))
}

/// An array as written at one step, with its offset in tuples.
#[derive(Debug)]
struct WrittenArray {
    pieces: Vec<DataArray>,
    offset: usize,
}

#[derive(Debug)]
struct PreviousStep {
    pieces: Vec<DataSet>,
    geometry: GeometryOffsets,
    arrays: Vec<WrittenArray>,
}

/// Writes the pieces of one leaf into `group`.
#[derive(Debug)]
pub(crate) struct LeafWriter {
    group: Group,
    compression: Option<u32>,
    shape: Option<LeafShape>,
    previous: Option<PreviousStep>,
}

impl LeafWriter {
    pub(crate) fn new(group: Group, compression: Option<u32>) -> Self {
        Self {
            group,
            compression,
            shape: None,
            previous: None,
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.shape.is_some()
    }

    /// Appends `pieces` as step `step = (index, time)`, or as the only content of a leaf
    /// without steps.
    pub(crate) fn write(&mut self, step: Option<(usize, f64)>, pieces: &[Piece<'_>]) -> VtkHdfResult<()> {
        let shape = LeafShape::describe(pieces, step.is_some())?;
        match &self.shape {
            Some(existing) => existing.check_continues(&shape)?,
            None => self.start(&shape)?,
        }
        let previous = self.previous.take().filter(|_| shape.temporal);

        let geometry = self.write_geometry(shape.kind, pieces, previous.as_ref())?;
        let arrays = self.write_arrays(&shape, pieces, previous.as_ref())?;
        if let Some((index, time)) = step {
            self.write_step(index, time, &shape, pieces.len(), &geometry, &arrays)?;
        }

        self.previous = Some(PreviousStep {
            pieces: pieces.iter().map(|p| p.data.clone()).collect(),
            geometry,
            arrays,
        });
        self.shape = Some(shape);
        Ok(())
    }

    fn start(&self, shape: &LeafShape) -> VtkHdfResult<()> {
        set_attribute(&self.group, "Type", DataSetType::from(shape.kind).name())?;
        if let Some(image) = &shape.image {
            set_attribute(&self.group, "WholeExtent", image.extent().to_vec())?;
            set_attribute(&self.group, "Origin", image.origin().to_vec())?;
            set_attribute(&self.group, "Spacing", image.spacing().to_vec())?;
            set_attribute(&self.group, "Direction", image.direction().to_vec())?;
        }
        if !shape.temporal {
            return Ok(());
        }

        let steps = self.group.create_group("Steps")?;
        set_attribute(&steps, "NSteps", vec![0i64])?;
        require_dataset(&steps, "Values", NativeType::Double, &[], None)?;
        if shape.kind != DataSetKind::ImageData {
            let topologies = topology_prefixes(shape.kind).len();
            for name in ["PartOffsets", "NumberOfParts", "PointOffsets"] {
                require_dataset(&steps, name, NativeType::LLong, &[], None)?;
            }
            for name in ["CellOffsets", "ConnectivityIdOffsets"] {
                require_dataset(&steps, name, NativeType::LLong, &[topologies], None)?;
            }
        }
        Ok(())
    }

    fn write_geometry(
        &self,
        kind: DataSetKind,
        pieces: &[Piece<'_>],
        previous: Option<&PreviousStep>,
    ) -> VtkHdfResult<GeometryOffsets> {
        let prefixes = topology_prefixes(kind);
        if kind == DataSetKind::ImageData {
            return Ok(GeometryOffsets::zero(0));
        }
        if let Some(previous) = previous {
            if same_geometry(&previous.pieces, pieces) {
                trace!("{}: geometry unchanged, reusing the previous step", self.group.path());
                return Ok(previous.geometry.clone());
            }
        }

        let offsets = GeometryOffsets::current(&self.group, kind)?;
        append_metadata(
            &self.group,
            "NumberOfPoints",
            &counts(pieces, |p| p.number_of_points())?,
            &[],
        )?;
        let points = pieces
            .iter()
            .map(|p| {
                p.data
                    .points()
                    .cloned()
                    .ok_or_else(|| vtkhdf_err!("{kind} pieces have no points"))
            })
            .collect::<VtkHdfResult<Vec<_>>>()?;
        self.append_column("Points", pieces, &points, &[3])?;

        for (t, prefix) in prefixes.iter().enumerate() {
            let cells = pieces
                .iter()
                .map(|p| cells_of(p.data, t))
                .collect::<VtkHdfResult<Vec<_>>>()?;
            let number_of_cells = cells
                .iter()
                .map(|c| to_index(c.number_of_cells()))
                .collect::<VtkHdfResult<Vec<_>>>()?;
            let number_of_ids = cells
                .iter()
                .map(|c| to_index(c.number_of_connectivity_ids()))
                .collect::<VtkHdfResult<Vec<_>>>()?;
            append_metadata(&self.group, &in_topology(prefix, "NumberOfCells"), &number_of_cells, &[])?;
            append_metadata(
                &self.group,
                &in_topology(prefix, "NumberOfConnectivityIds"),
                &number_of_ids,
                &[],
            )?;

            let offsets_arrays = cells
                .iter()
                .map(|c| DataArray::from_values("Offsets", 1, c.offsets().to_vec()))
                .collect::<VtkHdfResult<Vec<_>>>()?;
            self.append_column(&in_topology(prefix, "Offsets"), pieces, &offsets_arrays, &[])?;
            let connectivity = cells
                .iter()
                .map(|c| DataArray::from_values("Connectivity", 1, c.connectivity().to_vec()))
                .collect::<VtkHdfResult<Vec<_>>>()?;
            self.append_column(&in_topology(prefix, "Connectivity"), pieces, &connectivity, &[])?;
        }

        if kind == DataSetKind::UnstructuredGrid {
            let types = pieces
                .iter()
                .map(|p| match p.data {
                    DataSet::UnstructuredGrid(grid) => {
                        DataArray::from_values("Types", 1, grid.types().to_vec())
                    }
                    other => Err(vtkhdf_err!("a {} piece among unstructured grids", other.kind())),
                })
                .collect::<VtkHdfResult<Vec<_>>>()?;
            self.append_column("Types", pieces, &types, &[])?;
        }
        Ok(offsets)
    }

    fn write_arrays(
        &self,
        shape: &LeafShape,
        pieces: &[Piece<'_>],
        previous: Option<&PreviousStep>,
    ) -> VtkHdfResult<Vec<WrittenArray>> {
        let mut written = Vec::with_capacity(shape.arrays.len());
        for (i, (attribute, name)) in shape.arrays.iter().enumerate() {
            let holders = match attribute {
                AttributeType::Field => &pieces[..pieces.len().min(1)],
                AttributeType::Point | AttributeType::Cell => pieces,
            };
            let arrays = holders
                .iter()
                .map(|p| {
                    p.data
                        .attributes()
                        .get(*attribute, name)
                        .cloned()
                        .ok_or_else(|| vtkhdf_err!("a piece lacks {attribute} array {name}"))
                })
                .collect::<VtkHdfResult<Vec<_>>>()?;

            let reused = previous
                .and_then(|p| p.arrays.get(i))
                .filter(|before| before.pieces == arrays)
                .map(|before| before.offset);
            let offset = match reused {
                Some(offset) => {
                    trace!("{attribute} array {name} unchanged, reusing offset {offset}");
                    offset
                }
                None => self.append_attribute(shape, *attribute, name, holders, &arrays)?,
            };
            written.push(WrittenArray {
                pieces: arrays,
                offset,
            });
        }
        Ok(written)
    }

    /// Appends one attribute array and returns its offset in tuples.
    fn append_attribute(
        &self,
        shape: &LeafShape,
        attribute: AttributeType,
        name: &str,
        holders: &[Piece<'_>],
        arrays: &[DataArray],
    ) -> VtkHdfResult<usize> {
        let path = array_path(attribute, name);
        let dims = match (&shape.image, attribute) {
            (Some(image), AttributeType::Point) => Some(image.dimensions()),
            (Some(image), AttributeType::Cell) => Some(image.cell_dimensions()),
            _ => None,
        };
        match dims {
            Some([nx, ny, _]) => {
                let mut inner_dims = vec![ny, nx];
                if let Some(first) = arrays.first() {
                    inner_dims.extend(tuple_dims(first));
                }
                let row = self.append_column(&path, holders, arrays, &inner_dims)?;
                Ok(row * nx * ny)
            }
            None => {
                let inner_dims = arrays.first().map(tuple_dims).unwrap_or_default();
                self.append_column(&path, holders, arrays, &inner_dims)
            }
        }
    }

    /// Appends the arrays of `pieces` to dataset `path` and returns the first row they took.
    ///
    /// When every piece lives in a sibling file its rows are linked instead of copied.
    fn append_column(
        &self,
        path: &str,
        pieces: &[Piece<'_>],
        arrays: &[DataArray],
        inner_dims: &[usize],
    ) -> VtkHdfResult<usize> {
        let Some(first) = arrays.first() else {
            return dataset_rows(&self.group, path);
        };
        let dataset = require_dataset(
            &self.group,
            path,
            native_type_of(first)?,
            inner_dims,
            self.compression,
        )?;
        let start = dataset.dims()?[0];

        match pieces.iter().map(|p| p.link).collect::<Option<Vec<_>>>() {
            Some(links) => {
                let target = format!("{VTKHDF_ROOT_PATH}/{path}");
                for link in links {
                    dataset.append_external(&link.file, &target, link.layout.range(path)?)?;
                }
            }
            None => {
                let mut joined = first.clone();
                for array in &arrays[1..] {
                    joined.append(array)?;
                }
                dataset.append(&joined.data().to_le_bytes()?)?;
            }
        }
        Ok(start)
    }

    fn write_step(
        &self,
        index: usize,
        time: f64,
        shape: &LeafShape,
        parts: usize,
        geometry: &GeometryOffsets,
        arrays: &[WrittenArray],
    ) -> VtkHdfResult<()> {
        let steps = self.group.open_group("Steps")?;
        require_dataset(&steps, "Values", NativeType::Double, &[], None)?.append_values(&[time])?;
        if shape.kind != DataSetKind::ImageData {
            let topologies = geometry.cell_offsets.len();
            append_metadata(&steps, "PartOffsets", &[to_index(geometry.part_offset)?], &[])?;
            append_metadata(&steps, "NumberOfParts", &[to_index(parts)?], &[])?;
            append_metadata(&steps, "PointOffsets", &[to_index(geometry.point_offset)?], &[])?;
            append_metadata(
                &steps,
                "CellOffsets",
                &indices(&geometry.cell_offsets)?,
                &[topologies],
            )?;
            append_metadata(
                &steps,
                "ConnectivityIdOffsets",
                &indices(&geometry.connectivity_offsets)?,
                &[topologies],
            )?;
        }

        for ((attribute, name), written) in shape.arrays.iter().zip(arrays) {
            append_metadata(
                &steps,
                &format!("{}/{name}", attribute.offsets_group_name()),
                &[to_index(written.offset)?],
                &[],
            )?;
            if *attribute == AttributeType::Field {
                let size = written.pieces.first().map_or([0, 0], |a| {
                    [a.number_of_components(), a.number_of_tuples()]
                });
                append_metadata(&steps, &format!("FieldDataSizes/{name}"), &indices(&size)?, &[2])?;
            }
        }

        set_attribute(&steps, "NSteps", vec![to_index(index + 1)?])?;
        debug!("{}: wrote step {index} at time {time}", self.group.path());
        Ok(())
    }
}

fn counts(pieces: &[Piece<'_>], count: impl Fn(&DataSet) -> usize) -> VtkHdfResult<Vec<Index>> {
    pieces.iter().map(|p| to_index(count(p.data))).collect()
}

fn indices(values: &[usize]) -> VtkHdfResult<Vec<Index>> {
    values.iter().map(|v| to_index(*v)).collect()
}

/// The cells of topology `t` of a point set.
fn cells_of(data: &DataSet, t: usize) -> VtkHdfResult<&CellArray> {
    match data {
        DataSet::UnstructuredGrid(grid) if t == 0 => Ok(grid.cells()),
        DataSet::PolyData(poly) => ALL_TOPOLOGIES
            .get(t)
            .map(|topology| poly.cells(*topology))
            .ok_or_else(|| vtkhdf_err!("no topology {t}")),
        other => Err(vtkhdf_err!("a {} piece has no topology {t}", other.kind())),
    }
}

fn same_geometry(previous: &[DataSet], pieces: &[Piece<'_>]) -> bool {
    previous.len() == pieces.len()
        && previous.iter().zip(pieces).all(|(a, b)| match (a, b.data) {
            (DataSet::UnstructuredGrid(a), DataSet::UnstructuredGrid(b)) => {
                a.points() == b.points() && a.cells() == b.cells() && a.types() == b.types()
            }
            (DataSet::PolyData(a), DataSet::PolyData(b)) => {
                a.points() == b.points() && ALL_TOPOLOGIES.iter().all(|t| a.cells(*t) == b.cells(*t))
            }
            _ => false,
        })
}
