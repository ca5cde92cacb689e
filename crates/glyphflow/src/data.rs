// Common geometries

#[rustfmt::skip]
pub static PLANE_VERTICES: [f32; 12] = [
     1.0, -1.0,
     1.0,  1.0,
    -1.0,  1.0,
    -1.0,  1.0,
    -1.0, -1.0,
     1.0, -1.0,
];
