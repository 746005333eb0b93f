extern crate nalgebra as na;

use std::fs;
use std::path::Path;
use na::DMatrix;
use tracing::info;

use crate::terrain::TerrainModel;
use crate::{Float, PipelineError, Result};

#[derive(Debug,Default)]
struct GridHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x_corner: Option<Float>,
    y_corner: Option<Float>,
    x_center: Option<Float>,
    y_center: Option<Float>,
    cellsize: Option<Float>,
    nodata: Option<Float>
}

/**
 * ESRI ASCII grid. Header keys are case insensitive:
 * ncols, nrows, xllcorner|xllcenter, yllcorner|yllcenter, cellsize, NODATA_value.
 * Rows are listed north to south and become south first terrain rows.
 * NODATA cells are NaN.
 */
pub fn load_ascii_grid(file_path: &Path) -> Result<TerrainModel> {
    let contents = fs::read_to_string(file_path)?;
    let mut header = GridHeader::default();
    let mut values = Vec::<Float>::new();

    for line in contents.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let mut fields = line.split_whitespace();
        let first = match fields.next() {
            Some(f) => f,
            None => continue
        };
        if values.is_empty() && first.parse::<Float>().is_err() {
            let value = fields.next().ok_or_else(|| PipelineError::malformed(file_path, format!("header key {} has no value", first)))?;
            let parse_float = |v: &str| v.parse::<Float>().map_err(|_| PipelineError::malformed(file_path, format!("invalid value {} for {}", v, first)));
            let parse_count = |v: &str| v.parse::<usize>().map_err(|_| PipelineError::malformed(file_path, format!("invalid value {} for {}", v, first)));
            match first.to_ascii_lowercase().as_str() {
                "ncols" => header.ncols = Some(parse_count(value)?),
                "nrows" => header.nrows = Some(parse_count(value)?),
                "xllcorner" => header.x_corner = Some(parse_float(value)?),
                "yllcorner" => header.y_corner = Some(parse_float(value)?),
                "xllcenter" => header.x_center = Some(parse_float(value)?),
                "yllcenter" => header.y_center = Some(parse_float(value)?),
                "cellsize" => header.cellsize = Some(parse_float(value)?),
                "nodata_value" => header.nodata = Some(parse_float(value)?),
                other => return Err(PipelineError::malformed(file_path, format!("unknown header key {}", other)))
            }
            continue;
        }
        for field in line.split_whitespace() {
            let v = field.parse::<Float>().map_err(|_| PipelineError::malformed(file_path, format!("invalid elevation {}", field)))?;
            values.push(v);
        }
    }

    let ncols = header.ncols.ok_or_else(|| PipelineError::malformed(file_path, "missing ncols"))?;
    let nrows = header.nrows.ok_or_else(|| PipelineError::malformed(file_path, "missing nrows"))?;
    let cellsize = header.cellsize.ok_or_else(|| PipelineError::malformed(file_path, "missing cellsize"))?;
    let (x_min, y_min) = match (header.x_center, header.y_center, header.x_corner, header.y_corner) {
        (Some(x), Some(y), _, _) => (x, y),
        (_, _, Some(x), Some(y)) => (x + 0.5*cellsize, y + 0.5*cellsize),
        _ => return Err(PipelineError::malformed(file_path, "missing lower left coordinates"))
    };
    if values.len() != ncols*nrows {
        return Err(PipelineError::malformed(file_path, format!("expected {} elevations, found {}", ncols*nrows, values.len())));
    }

    let elevations = DMatrix::<Float>::from_fn(nrows, ncols, |r, c| {
        let v = values[(nrows - 1 - r)*ncols + c];
        match header.nodata {
            Some(nodata) if v == nodata => Float::NAN,
            _ => v
        }
    });

    let terrain = TerrainModel::new(elevations, x_min, y_min, cellsize, cellsize)
        .map_err(|e| PipelineError::malformed(file_path, e.to_string()))?;
    info!("loaded terrain {:?}: {}x{} nodes, cell size {}", file_path, nrows, ncols, cellsize);
    Ok(terrain)
}
