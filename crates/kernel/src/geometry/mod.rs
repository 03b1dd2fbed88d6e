pub mod bbox;
pub mod plane;
pub mod point;
pub mod polygon;
pub mod vector;
