// Vehicle frame <-> geographic coordinates
// A single fixed affine matrix applied to homogeneous [x, y, 1] vectors.

use serde::{Deserialize, Serialize};

/// Position in the vehicle's planar frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f64,
    pub y: f64,
}

impl LocalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &LocalPosition) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

type Matrix3 = [[f64; 3]; 3];

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Transform matrix is singular (determinant {det:e})")]
    Singular { det: f64 },
}

/// Forward matrix maps local -> (lng, lat); the inverse is computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    forward: Matrix3,
    inverse: Matrix3,
}

impl AffineTransform {
    pub fn from_matrix(forward: Matrix3) -> Result<Self, TransformError> {
        let inverse = invert(&forward)?;
        Ok(Self { forward, inverse })
    }

    pub fn to_geo(&self, local: LocalPosition) -> GeoPosition {
        let [lng, lat] = apply(&self.forward, local.x, local.y);
        GeoPosition { lat, lng }
    }

    pub fn to_local(&self, geo: GeoPosition) -> LocalPosition {
        let [x, y] = apply(&self.inverse, geo.lng, geo.lat);
        LocalPosition { x, y }
    }
}

/// Multiply `m` by the column vector [a, b, 1] and dehomogenize
fn apply(m: &Matrix3, a: f64, b: f64) -> [f64; 2] {
    let v = [a, b, 1.0];
    let mut out = [0.0f64; 3];
    for (row, o) in m.iter().zip(out.iter_mut()) {
        *o = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    // w is 1 for a proper affine matrix, divide anyway so a non-unit bottom row still works
    let w = if out[2] == 0.0 { 1.0 } else { out[2] };
    [out[0] / w, out[1] / w]
}

/// Inverse via adjugate / determinant
fn invert(m: &Matrix3) -> Result<Matrix3, TransformError> {
    // 2x2 minor over rows r0, r1 and columns c0, c1
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };

    let det = m[0][0] * cof(1, 2, 1, 2) - m[0][1] * cof(1, 2, 0, 2) + m[0][2] * cof(1, 2, 0, 1);
    if det == 0.0 || !det.is_finite() {
        return Err(TransformError::Singular { det });
    }

    let adj = [
        [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
        [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
        [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
    ];

    Ok(adj.map(|row| row.map(|v| v / det)))
}
