use std::fs;
use std::path::Path;

use rstest::rstest;
use vtkhdf_array::{
    AttributeType, Attributes, CellArray, DataArray, DataObject, DataSet, ImageData,
    MultiBlockDataSet, MultiBlockNode, PartitionedDataSet, PartitionedDataSetCollection, PolyData,
    Topology, UnstructuredGrid, merge_partitions,
};
use vtkhdf_container::{ContainerFile, Mode};
use vtkhdf_error::VtkHdfError;

use crate::*;

/// `points` points on a line and `cells` triangles over them, with a point and a cell array.
fn grid(points: usize, cells: usize, shift: f32) -> UnstructuredGrid {
    let coordinates = (0..points)
        .flat_map(|i| [i as f32, shift, 0.0])
        .collect::<Vec<_>>();
    let connectivity = (0..cells)
        .flat_map(|c| (0..3).map(move |k| ((c + k) % points) as i64))
        .collect::<Vec<_>>();
    let offsets = (0..=cells).map(|c| 3 * c as i64).collect::<Vec<_>>();
    let attributes = Attributes::default()
        .with_array(
            AttributeType::Point,
            DataArray::from_values(
                "Pressure",
                1,
                (0..points).map(|i| i as f32 + shift).collect(),
            )
            .unwrap(),
        )
        .unwrap()
        .with_array(
            AttributeType::Cell,
            DataArray::from_values("Id", 1, (0..cells).map(|c| c as i64).collect()).unwrap(),
        )
        .unwrap();
    UnstructuredGrid::try_new(
        DataArray::from_values("coords", 3, coordinates).unwrap(),
        CellArray::try_new(offsets, connectivity).unwrap(),
        vec![5; cells],
    )
    .unwrap()
    .with_attributes(attributes)
}

fn poly() -> PolyData {
    let points = DataArray::from_values(
        "p",
        3,
        vec![0.0f64, 0., 0., 1., 0., 0., 0., 1., 0., 1., 1., 0.],
    )
    .unwrap();
    let attributes = Attributes::default()
        .with_array(
            AttributeType::Point,
            DataArray::from_values("Normals", 3, vec![0.0f32, 0., 1., 0., 0., 1., 0., 0., 1., 0., 0., 1.])
                .unwrap(),
        )
        .unwrap()
        .with_array(
            AttributeType::Cell,
            DataArray::from_values("Kind", 1, vec![0u8, 1, 2, 2]).unwrap(),
        )
        .unwrap()
        .with_array(
            AttributeType::Field,
            DataArray::from_values("Revision", 1, vec![7i32, 2]).unwrap(),
        )
        .unwrap();
    PolyData::try_new(points)
        .unwrap()
        .with_cells(Topology::Vertices, CellArray::from_cells([vec![0i64]]).unwrap())
        .with_cells(Topology::Lines, CellArray::from_cells([vec![0i64, 1]]).unwrap())
        .with_cells(
            Topology::Polygons,
            CellArray::from_cells([vec![0i64, 1, 2], vec![1, 3, 2]]).unwrap(),
        )
        .with_attributes(attributes)
}

fn image() -> ImageData {
    let attributes = Attributes::default()
        .with_array(
            AttributeType::Point,
            DataArray::from_values("T", 1, (0..24).map(f64::from).collect()).unwrap(),
        )
        .unwrap()
        .with_array(
            AttributeType::Cell,
            DataArray::from_values("V", 3, (0..18).map(|v| v as f32).collect()).unwrap(),
        )
        .unwrap();
    ImageData::try_new([0, 3, 0, 2, 0, 1])
        .unwrap()
        .with_origin([0.5, 0.0, -1.0])
        .with_spacing([0.1, 0.2, 0.4])
        .with_attributes(attributes)
}

fn partitioned() -> PartitionedDataSet {
    PartitionedDataSet::new(vec![
        grid(10, 4, 0.0).into(),
        grid(6, 3, 1.0).into(),
        grid(8, 8, 2.0).into(),
    ])
}

fn collection() -> PartitionedDataSetCollection {
    PartitionedDataSetCollection::new()
        .with_block("solid", partitioned())
        .with_block("skin", PartitionedDataSet::new(vec![poly().into()]))
        .with_block("ghosts", PartitionedDataSet::default())
}

fn multiblock() -> MultiBlockDataSet {
    MultiBlockDataSet::new()
        .with_block("grids", MultiBlockNode::Partitioned(partitioned()))
        .with_block(
            "parts",
            MultiBlockNode::MultiBlock(
                MultiBlockDataSet::new()
                    .with_block("surface", MultiBlockNode::DataSet(poly().into()))
                    .with_block("volume", MultiBlockNode::DataSet(image().into())),
            ),
        )
        .with_block("nothing", MultiBlockNode::MultiBlock(MultiBlockDataSet::new()))
}

fn round_trip(path: &Path, object: &DataObject, options: &WriteOptions) -> DataObject {
    write(path, object, options).unwrap();
    assert!(can_read_file(path));
    read(path, &ReadOptions::default()).unwrap()
}

#[rstest]
#[case::grid(grid(100, 50, 0.0).into())]
#[case::poly(poly().into())]
#[case::image(image().into())]
#[case::empty_poly(PolyData::default().into())]
#[case::partitioned(partitioned().into())]
#[case::empty_partitioned(PartitionedDataSet::default().into())]
#[case::collection(collection().into())]
#[case::multiblock(multiblock().into())]
fn every_type_round_trips(#[case] object: DataObject) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mesh.vtkhdf");
    assert_eq!(round_trip(&path, &object, &WriteOptions::default()), object);
}

#[rstest]
fn options_do_not_change_what_is_read(
    #[values(false, true)] external_partitions: bool,
    #[values(false, true)] external_composite: bool,
    #[values(0, 4)] level: u32,
    #[values(partitioned().into(), collection().into(), multiblock().into())] object: DataObject,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mesh.vtkhdf");
    let options = WriteOptions::default()
        .with_external_partitions(external_partitions)
        .with_external_composite(external_composite)
        .with_compression_level(level);
    assert_eq!(round_trip(&path, &object, &options), object);
}

#[rstest]
#[case(false, false, 3)]
#[case(false, true, 1)]
#[case(true, true, 2)]
#[case(true, false, 5)]
fn siblings_are_named_after_the_main_file(
    #[case] external_partitions: bool,
    #[case] external_composite: bool,
    #[case] level: u32,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.vtkhdf");
    let options = WriteOptions::default()
        .with_external_partitions(external_partitions)
        .with_external_composite(external_composite)
        .with_compression_level(level);
    let object = DataObject::from(collection());
    assert_eq!(round_trip(&path, &object, &options), object);

    // inline blocks name their parts after the block file they would have had
    let block = block_file_path(&path, 0);
    assert_eq!(block.exists(), external_composite);
    let part = part_file_path(&block, 2);
    assert_eq!(part.exists(), external_partitions);
}

fn pressure_series() -> Vec<(f64, DataObject)> {
    [1.0, 3.0, 5.0]
        .into_iter()
        .map(|time| {
            let mut step = grid(100, 50, 0.0);
            let pressure = DataArray::from_values(
                "Pressure",
                1,
                (0..100).map(|i| i as f32 * time as f32).collect(),
            )
            .unwrap();
            let mut attributes = Attributes::default();
            attributes.add(AttributeType::Point, pressure).unwrap();
            for array in step.attributes().arrays(AttributeType::Cell) {
                attributes.add(AttributeType::Cell, array.clone()).unwrap();
            }
            step = step.with_attributes(attributes);
            (time, step.into())
        })
        .collect()
}

#[test]
fn time_series_read_any_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pressure.vtkhdf");
    let steps = pressure_series();
    write_time_series(&path, &steps, &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(file.number_of_steps().unwrap(), 3);
    assert_eq!(file.time_values().unwrap(), vec![1.0, 3.0, 5.0]);
    for (step, (_, expected)) in steps.iter().enumerate() {
        let read = file.read(&ReadOptions::default().with_step(step)).unwrap();
        assert_eq!(&read, expected);
    }
    // the geometry and the cell ids never change, so they are stored once
    let root = file.root();
    assert_eq!(dataset_rows(root, "Points").unwrap(), 100);
    assert_eq!(dataset_rows(root, "CellData/Id").unwrap(), 50);
    assert_eq!(dataset_rows(root, "PointData/Pressure").unwrap(), 300);
    assert!(matches!(
        file.read(&ReadOptions::default().with_step(3)).unwrap_err(),
        VtkHdfError::RangeError(..)
    ));
}

#[rstest]
fn composite_series_keep_their_steps(
    #[values(false, true)] external_partitions: bool,
    #[values(false, true)] external_composite: bool,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.vtkhdf");
    let steps = pressure_series()
        .into_iter()
        .map(|(time, step)| {
            let step = step.into_data_set().unwrap();
            let tree = MultiBlockDataSet::new()
                .with_block("moving", MultiBlockNode::DataSet(step.clone()))
                .with_block(
                    "split",
                    MultiBlockNode::Partitioned(PartitionedDataSet::new(vec![step, poly().into()])),
                );
            (time, DataObject::from(tree))
        })
        .collect::<Vec<_>>();
    let options = WriteOptions::default()
        .with_external_partitions(external_partitions)
        .with_external_composite(external_composite);
    // the second leaf mixes kinds, which a leaf cannot hold
    assert!(write_time_series(&path, &steps, &options).is_err());

    let steps = steps
        .into_iter()
        .map(|(time, tree)| {
            let DataObject::MultiBlockDataSet(tree) = tree else {
                unreachable!()
            };
            let kept = tree.blocks()[0].clone();
            (time, MultiBlockDataSet::new().with_block(kept.0, kept.1).into())
        })
        .collect::<Vec<(f64, DataObject)>>();
    write_time_series(&path, &steps, &options).unwrap();
    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(file.number_of_steps().unwrap(), 3);
    assert_eq!(
        file.read(&ReadOptions::default().with_step(2)).unwrap(),
        steps[2].1
    );
}

#[test]
fn only_the_first_step_is_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("first.vtkhdf");
    let steps = pressure_series();
    let options = WriteOptions::default().with_write_all_time_steps(false);
    write_time_series(&path, &steps, &options).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(file.number_of_steps().unwrap(), 0);
    assert_eq!(file.read(&ReadOptions::default()).unwrap(), steps[0].1);
}

#[test]
fn steps_must_come_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer =
        VtkHdfWriter::create(dir.path().join("order.vtkhdf"), WriteOptions::default()).unwrap();
    let grid = DataObject::from(grid(4, 2, 0.0));
    assert!(matches!(
        writer.write_step(1, 0.0, &grid).unwrap_err(),
        VtkHdfError::SequenceError(..)
    ));
    writer.write_step(0, 0.0, &grid).unwrap();
    assert!(matches!(
        writer.write_step(0, 0.0, &grid).unwrap_err(),
        VtkHdfError::SequenceError(..)
    ));
    writer.write_step(1, 1.0, &grid).unwrap();
    writer.finish().unwrap();
}

#[test]
fn field_data_sizes_follow_the_steps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fields.vtkhdf");
    let steps = [2usize, 5, 1]
        .into_iter()
        .enumerate()
        .map(|(i, tuples)| {
            let mut step = poly();
            let labels = DataArray::from_values("Labels", 2, vec![i as i64; 2 * tuples]).unwrap();
            let mut attributes = step.attributes().clone();
            attributes.add(AttributeType::Field, labels).unwrap();
            step = step.with_attributes(attributes);
            (i as f64, DataObject::from(step))
        })
        .collect::<Vec<_>>();
    write_time_series(&path, &steps, &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(get_field_array_size(file.root(), 1, "Labels").unwrap(), [2, 5]);
    for (step, (_, expected)) in steps.iter().enumerate() {
        assert_eq!(
            &file.read(&ReadOptions::default().with_step(step)).unwrap(),
            expected
        );
    }
}

#[test]
fn image_series_stack_along_z() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images.vtkhdf");
    let steps = (0..3)
        .map(|step| {
            let cells = image()
                .attributes()
                .get(AttributeType::Cell, "V")
                .unwrap()
                .clone();
            let attributes = Attributes::default()
                .with_array(
                    AttributeType::Point,
                    DataArray::from_values("T", 1, (0..24).map(|v| f64::from(v + step)).collect())
                        .unwrap(),
                )
                .unwrap()
                .with_array(AttributeType::Cell, cells)
                .unwrap();
            (f64::from(step), DataObject::from(image().with_attributes(attributes)))
        })
        .collect::<Vec<_>>();
    write_time_series(&path, &steps, &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(get_dimensions(&file.root().open_dataset("PointData/T").unwrap()).unwrap(), vec![6, 3, 4]);
    assert_eq!(get_dimensions(&file.root().open_dataset("CellData/V").unwrap()).unwrap(), vec![1, 2, 3, 3]);
    assert_eq!(
        get_array_offset(file.root(), 2, AttributeType::Point, "T").unwrap(),
        Some(48)
    );
    assert_eq!(
        file.read(&ReadOptions::default().with_step(2)).unwrap(),
        steps[2].1
    );
}

#[test]
fn pieces_keep_their_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pieces.vtkhdf");
    let object = DataObject::from(partitioned());
    write(&path, &object, &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(file.number_of_pieces(0).unwrap(), 3);
    let second = file.read(&ReadOptions::default().with_piece_range(1..2)).unwrap();
    assert_eq!(
        second,
        DataObject::from(PartitionedDataSet::new(partitioned().partitions()[1..2].to_vec()))
    );

    let merged = file.read(&ReadOptions::default().with_merge_parts(true)).unwrap();
    assert_eq!(
        merged,
        DataObject::from(merge_partitions(partitioned().partitions()).unwrap())
    );
    let shares = (0..2)
        .map(|rank| file.read(&ReadOptions::default().with_piece(rank, 2)).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        shares[0],
        DataObject::from(PartitionedDataSet::new(partitioned().partitions()[..1].to_vec()))
    );
    assert_eq!(
        shares[1],
        DataObject::from(PartitionedDataSet::new(partitioned().partitions()[1..].to_vec()))
    );
    assert!(matches!(
        file.read(&ReadOptions::default().with_piece_range(2..5)).unwrap_err(),
        VtkHdfError::RangeError(..)
    ));
}

#[rstest]
fn single_pieces_keep_their_partitioned_identity(
    #[values(false, true)] external_partitions: bool,
    #[values(false, true)] external_composite: bool,
) {
    let dir = tempfile::tempdir().unwrap();
    let options = WriteOptions::default()
        .with_external_partitions(external_partitions)
        .with_external_composite(external_composite);
    let alone = PartitionedDataSet::new(vec![grid(4, 2, 0.0).into()]);

    let leaf = DataObject::from(alone.clone());
    assert_eq!(round_trip(&dir.path().join("alone.vtkhdf"), &leaf, &options), leaf);

    let tree = DataObject::from(
        MultiBlockDataSet::new()
            .with_block("alone", MultiBlockNode::Partitioned(alone))
            .with_block("plain", MultiBlockNode::DataSet(grid(5, 1, 1.0).into())),
    );
    assert_eq!(round_trip(&dir.path().join("tree.vtkhdf"), &tree, &options), tree);

    // merging still hands back the dataset itself
    let merged = read(
        dir.path().join("alone.vtkhdf"),
        &ReadOptions::default().with_merge_parts(true),
    )
    .unwrap();
    assert_eq!(merged, DataObject::from(grid(4, 2, 0.0)));
}

#[test]
fn merged_collections_hold_one_piece_per_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.vtkhdf");
    write(&path, &collection().into(), &WriteOptions::default()).unwrap();

    let read = read(&path, &ReadOptions::default().with_merge_parts(true)).unwrap();
    let DataObject::PartitionedDataSetCollection(read) = read else {
        unreachable!("a collection reads back as a collection")
    };
    let sizes = read
        .blocks()
        .iter()
        .map(|(name, block)| (name.as_str(), block.len()))
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![("solid", 1), ("skin", 1), ("ghosts", 0)]);
    assert_eq!(
        read.blocks()[0].1.partitions()[0],
        merge_partitions(partitioned().partitions()).unwrap()
    );
}

#[test]
fn missing_siblings_are_reference_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linked.vtkhdf");
    let options = WriteOptions::default().with_external_composite(true);
    write(&path, &collection().into(), &options).unwrap();
    fs::remove_file(block_file_path(&path, 1)).unwrap();

    let err = read(&path, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err.innermost(), VtkHdfError::ReferenceError(..)));
}

#[test]
fn missing_part_files_are_reference_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parts.vtkhdf");
    let options = WriteOptions::default().with_external_partitions(true);
    write(&path, &partitioned().into(), &options).unwrap();
    fs::remove_file(part_file_path(&path, 1)).unwrap();

    let err = read(&path, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err.innermost(), VtkHdfError::ReferenceError(..)));
    // pieces that do not touch the missing file still read
    let first = read(&path, &ReadOptions::default().with_piece_range(0..1)).unwrap();
    assert_eq!(
        first,
        DataObject::from(PartitionedDataSet::new(partitioned().partitions()[..1].to_vec()))
    );
}

#[test]
fn moving_pieces_advance_the_step_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("moving.vtkhdf");
    let steps = (0..3u8)
        .map(|step| {
            let pieces = PartitionedDataSet::new(vec![
                grid(4 + usize::from(step), 2, f32::from(step)).into(),
                grid(3, 1, f32::from(step)).into(),
            ]);
            (f64::from(step), DataObject::from(pieces))
        })
        .collect::<Vec<_>>();
    write_time_series(&path, &steps, &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    let root = file.root();
    assert_eq!(get_metadata(root, "Steps/PartOffsets", 3, 0).unwrap(), vec![0, 2, 4]);
    assert_eq!(get_metadata(root, "Steps/NumberOfParts", 3, 0).unwrap(), vec![2, 2, 2]);
    assert_eq!(get_metadata(root, "Steps/PointOffsets", 3, 0).unwrap(), vec![0, 7, 15]);
    assert_eq!(dataset_rows(root, "NumberOfPoints").unwrap(), 6);
    for (step, (_, expected)) in steps.iter().enumerate() {
        assert_eq!(&file.read(&ReadOptions::default().with_step(step)).unwrap(), expected);
    }
}

#[test]
fn interrupted_steps_leave_the_saved_ones_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash.vtkhdf");
    let steps = pressure_series();
    let mut writer = VtkHdfWriter::create(&path, WriteOptions::default()).unwrap();
    writer.write_step(0, steps[0].0, &steps[0].1).unwrap();

    // the payload of the next step lands, its offsets never do
    let pressure = writer.root_group().unwrap().open_dataset("PointData/Pressure").unwrap();
    pressure.append_values(&[1.0f32; 100]).unwrap();
    let _crashed = std::mem::ManuallyDrop::new((writer, pressure));

    let file = VtkHdfFile::open(&path).unwrap();
    assert_eq!(file.number_of_steps().unwrap(), 1);
    assert_eq!(dataset_rows(file.root(), "PointData/Pressure").unwrap(), 100);
    assert_eq!(file.read(&ReadOptions::default()).unwrap(), steps[0].1);
}

#[test]
fn unknown_content_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extended.vtkhdf");
    let object = DataObject::from(grid(12, 6, 0.5));
    write(&path, &object, &WriteOptions::default()).unwrap();
    {
        let file = ContainerFile::open(&path, Mode::ReadWrite).unwrap();
        let root = file.group(VTKHDF_ROOT_PATH).unwrap();
        root.set_attribute("Producer", "a solver").unwrap();
        root.create_group("Provenance")
            .unwrap()
            .set_attribute("Run", vec![42i64])
            .unwrap();
        root.open_group("PointData")
            .unwrap()
            .create_group("Annotations")
            .unwrap();
        file.close().unwrap();
    }
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), object);
}

#[test]
fn reads_release_their_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handles.vtkhdf");
    write(&path, &multiblock().into(), &WriteOptions::default()).unwrap();

    let file = VtkHdfFile::open(&path).unwrap();
    let open = file.root().file().open_handle_count();
    file.read(&ReadOptions::default()).unwrap();
    assert_eq!(file.root().file().open_handle_count(), open);
}

#[test]
fn files_without_a_root_are_not_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.vtkhdf");
    ContainerFile::create(&path).unwrap().close().unwrap();
    assert!(!can_read_file(&path));
    assert!(!can_read_file(dir.path().join("absent.vtkhdf")));
    assert!(VtkHdfFile::open(&path).is_err());
}

#[test]
fn data_sets_convert_to_objects() {
    let data = DataSet::from(poly());
    assert_eq!(
        DataSetType::of(&DataObject::from(data)).unwrap(),
        DataSetType::PolyData
    );
}
