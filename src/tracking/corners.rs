extern crate nalgebra as na;

use na::{DMatrix, Vector2};

use crate::image::{Image, mask::Mask, filter::sobel_gradients};
use crate::tracking::tracking_parameters::CornerParameters;
use crate::Float;

/**
 * Minimum eigenvalue of the 3x3 summed structure tensor (Shi & Tomasi 1994).
 * The outermost pixel ring is left at 0.
 */
pub fn min_eigenvalue_response(image: &Image) -> DMatrix<Float> {
    let (gx, gy) = sobel_gradients(image);
    let height = image.height();
    let width = image.width();
    let mut response = DMatrix::<Float>::zeros(height, width);
    if height < 3 || width < 3 {
        return response;
    }

    for r in 1..height-1 {
        for c in 1..width-1 {
            let (mut a, mut b, mut d) = (0.0, 0.0, 0.0);
            for dr in 0..3 {
                for dc in 0..3 {
                    let ix = gx.buffer[(r+dr-1,c+dc-1)];
                    let iy = gy.buffer[(r+dr-1,c+dc-1)];
                    a += ix*ix;
                    b += ix*iy;
                    d += iy*iy;
                }
            }
            let half_trace = 0.5*(a + d);
            let discriminant = (0.25*(a - d).powi(2) + b*b).sqrt();
            response[(r,c)] = half_trace - discriminant;
        }
    }
    response
}

/// Strongest masked corners, at least `min_distance` apart.
pub fn shi_tomasi_corners(image: &Image, mask: &Mask, parameters: &CornerParameters) -> Vec<Vector2<Float>> {
    let response = min_eigenvalue_response(image);
    let (height, width) = response.shape();
    // Quality is relative to the strongest corner inside the mask
    let max_response = (0..height).flat_map(|r| (0..width).map(move |c| (r, c)))
        .filter(|&(r, c)| mask.contains(c as Float, r as Float))
        .map(|(r, c)| response[(r,c)])
        .fold(0.0, Float::max);
    if !(max_response > 0.0) {
        return Vec::new();
    }
    let threshold = parameters.quality*max_response;

    let mut candidates = Vec::<(Float, usize, usize)>::new();
    for r in 1..height.saturating_sub(1) {
        for c in 1..width.saturating_sub(1) {
            let value = response[(r,c)];
            if value < threshold || value <= 0.0 || !mask.contains(c as Float, r as Float) {
                continue;
            }
            let is_local_max = (r-1..=r+1).all(|rr| (c-1..=c+1).all(|cc| response[(rr,cc)] <= value));
            if is_local_max {
                candidates.push((value, r, c));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    select_with_min_distance(&candidates, parameters.min_distance, parameters.max_points, width, height)
}

/// Greedy selection on a bucket grid with cell size `min_distance`.
fn select_with_min_distance(candidates: &[(Float, usize, usize)], min_distance: Float, max_points: usize, width: usize, height: usize) -> Vec<Vector2<Float>> {
    let limit = match max_points {
        0 => usize::MAX,
        n => n
    };
    let cell = min_distance.max(1.0);
    let grid_width = ((width as Float)/cell).ceil() as usize + 1;
    let grid_height = ((height as Float)/cell).ceil() as usize + 1;
    let mut grid = vec![Vec::<Vector2<Float>>::new(); grid_width*grid_height];
    let min_distance_sq = min_distance*min_distance;

    let mut selected = Vec::<Vector2<Float>>::new();
    for &(_, r, c) in candidates {
        if selected.len() >= limit {
            break;
        }
        let point = Vector2::<Float>::new(c as Float, r as Float);
        let gx = ((c as Float)/cell) as usize;
        let gy = ((r as Float)/cell) as usize;

        let too_close = (gy.saturating_sub(1)..=(gy+1).min(grid_height-1)).any(|y|
            (gx.saturating_sub(1)..=(gx+1).min(grid_width-1)).any(|x|
                grid[y*grid_width + x].iter().any(|q| (q - point).norm_squared() < min_distance_sq)));

        if !too_close {
            grid[gy*grid_width + gx].push(point);
            selected.push(point);
        }
    }
    selected
}
