pub mod audit;
pub mod euler;
pub mod model;
pub mod primitives;
