//! Win32 and Direct3D 11 implementations of the overlay seams.

pub mod d3d11;
pub mod input;
pub mod painter;
pub mod window;
