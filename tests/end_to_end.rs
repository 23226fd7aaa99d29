use std::fs;

use volume_projection::{
    ComputeContext, DisplaySink, EngineState, PngSink, ProjectionAxis, ProjectionEngine,
    ReductionMode, VolumeBuffer, VolumeLoader, WindowSpec,
};

/// `[[[10, 20], [30, 40]], [[50, 60], [70, 80]]]` indexed [x][y][z], written
/// x-fastest as a MetaImage.
fn write_cube(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("cube.mha");
    let mut bytes = b"ObjectType = Image\nNDims = 3\nDimSize = 2 2 2\n\
        ElementType = MET_SHORT\nElementByteOrderMSB = False\nElementDataFile = LOCAL\n"
        .to_vec();
    for z in 0..2 {
        for y in 0..2 {
            for x in 0..2 {
                let value: i16 = 10 + 40 * x + 20 * y + 10 * z;
                bytes.extend(value.to_le_bytes());
            }
        }
    }
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn loaded_cube_projects_to_expected_gray_levels() {
    let dir = tempfile::tempdir().unwrap();
    let volume = VolumeLoader::load(write_cube(dir.path())).unwrap();
    assert_eq!(volume.sample(0, 1, 1).unwrap(), 40);
    assert_eq!(volume.sample(1, 0, 0).unwrap(), 50);

    let context = ComputeContext::cpu(Some(2)).unwrap();
    let window = WindowSpec::new(50.0, 100.0).unwrap();
    let mut engine = ProjectionEngine::new(
        &volume,
        &context,
        ProjectionAxis::AlongZ,
        ReductionMode::Maximum,
        window,
    );
    let frame = engine.render().unwrap().to_owned();
    assert_eq!(frame.dim(), (2, 2));
    assert_eq!(frame[[0, 0]], 50);
    assert_eq!(frame[[1, 1]], 203);

    let mut sink = PngSink::new(dir.path().join("mip.png"));
    sink.present(frame.view()).unwrap();
    let written = image::open(sink.path()).unwrap().into_luma8();
    assert_eq!(written.get_pixel(0, 0).0, [50]);
    assert_eq!(written.get_pixel(1, 1).0, [203]);
}

#[test]
fn every_axis_and_mode_stays_in_range() {
    let data = ndarray::Array3::from_shape_fn((6, 4, 3), |(x, y, z)| {
        (x as i16 - 3) * 9000 + (y as i16) * 500 - (z as i16) * 700
    });
    let volume = VolumeBuffer::new(data).unwrap();
    let context = ComputeContext::cpu(None).unwrap();
    let window = WindowSpec::new(-40.0, 400.0).unwrap();

    for axis in ProjectionAxis::ALL {
        for mode in [ReductionMode::Maximum, ReductionMode::Minimum] {
            let mut engine = ProjectionEngine::new(&volume, &context, axis, mode, window);
            let frame = engine.render().unwrap().to_owned();
            assert_eq!(frame.dim(), axis.output_shape(volume.dimensions()));
            assert_eq!(engine.state(), EngineState::Rendered);

            let repeat = engine.render().unwrap().to_owned();
            assert_eq!(frame, repeat, "{axis:?} {mode:?} not idempotent");
        }
    }
}

#[test]
fn minimum_never_exceeds_maximum() {
    let data = ndarray::Array3::from_shape_fn((5, 5, 5), |(x, y, z)| {
        ((x * 7 + y * 13 + z * 3) % 50) as i16 * 20 - 400
    });
    let volume = VolumeBuffer::new(data).unwrap();
    let context = ComputeContext::cpu(Some(3)).unwrap();
    let window = WindowSpec::new(0.0, 1000.0).unwrap();

    for axis in ProjectionAxis::ALL {
        let mut engine =
            ProjectionEngine::new(&volume, &context, axis, ReductionMode::Maximum, window);
        let max = engine.render().unwrap().to_owned();
        engine.set_mode(ReductionMode::Minimum);
        let min = engine.render().unwrap().to_owned();
        ndarray::Zip::from(&max)
            .and(&min)
            .for_each(|&hi, &lo| assert!(lo <= hi, "{axis:?}: min {lo} above max {hi}"));
    }
}
