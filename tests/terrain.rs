extern crate nalgebra as na;

mod common;

use na::DMatrix;

use glacier_velocity::terrain::TerrainModel;
use glacier_velocity::{Float, PipelineError};

fn sloped_terrain() -> TerrainModel {
    let elevations = DMatrix::<Float>::from_fn(4, 5, |r, c| 1000.0 + 3.0*c as Float + 7.0*r as Float + ((r*c) as Float).sqrt());
    TerrainModel::new(elevations, 500.0, 2000.0, 10.0, 20.0).unwrap()
}

#[test]
fn densify_preserves_nodes() {
    let terrain = sloped_terrain();
    let dense = terrain.densify(3).unwrap();
    assert_eq!(dense.rows(), 10);
    assert_eq!(dense.cols(), 13);
    for r in 0..terrain.rows() {
        for c in 0..terrain.cols() {
            let (x, y, z) = terrain.node(r, c);
            let (xd, yd, zd) = dense.node(3*r, 3*c);
            assert!((x - xd).abs() < 1e-9 && (y - yd).abs() < 1e-9);
            assert_eq!(z, zd);
        }
    }
}

#[test]
fn densify_preserves_bilinear_elevations() {
    let terrain = sloped_terrain();
    let dense = terrain.densify(2).unwrap();
    for &(x, y) in [(500.0, 2000.0), (512.5, 2031.0), (539.9, 2059.9), (525.0, 2010.0)].iter() {
        let original = terrain.elevation(x, y).unwrap();
        let densified = dense.elevation(x, y).unwrap();
        assert!((original - densified).abs() < 1e-9, "({}, {}): {} vs {}", x, y, original, densified);
    }
}

#[test]
fn densify_by_one_is_identity() {
    let terrain = sloped_terrain();
    let same = terrain.densify(1).unwrap();
    assert_eq!(same.elevations(), terrain.elevations());
    assert_eq!(same.spacing(), terrain.spacing());
}

#[test]
fn densify_by_zero_is_rejected() {
    assert!(matches!(sloped_terrain().densify(0), Err(PipelineError::InvalidArgument(_))));
}

#[test]
fn elevation_outside_extent_is_none() {
    let terrain = sloped_terrain();
    assert!(terrain.elevation(499.0, 2010.0).is_none());
    assert!(terrain.elevation(520.0, 2061.0).is_none());
    assert!(terrain.elevation(520.0, 2030.0).is_some());
}

#[test]
fn nodata_nodes_are_holes() {
    let mut elevations = DMatrix::<Float>::from_element(4, 4, 10.0);
    elevations[(1,1)] = Float::NAN;
    let terrain = TerrainModel::new(elevations, 0.0, 0.0, 1.0, 1.0).unwrap();
    assert!(terrain.elevation(0.5, 0.5).is_none());
    assert!(terrain.elevation(1.5, 0.2).is_none());
    assert_eq!(terrain.elevation(2.5, 2.5), Some(10.0));
    let extent = terrain.extent();
    assert_eq!((extent.z_min, extent.z_max), (10.0, 10.0));
}

#[test]
fn degenerate_grids_are_rejected() {
    assert!(TerrainModel::new(DMatrix::<Float>::zeros(1, 5), 0.0, 0.0, 1.0, 1.0).is_err());
    assert!(TerrainModel::new(DMatrix::<Float>::zeros(3, 3), 0.0, 0.0, 0.0, 1.0).is_err());
}

#[test]
fn flat_terrain_extent() {
    let terrain = common::flat_terrain();
    let extent = terrain.extent();
    assert_eq!((extent.x_min, extent.x_max, extent.y_min, extent.y_max), (-200.0, 200.0, 0.0, 400.0));
    assert_eq!(terrain.cols(), 81);
    assert_eq!(terrain.rows(), 81);
}
