//! Geometric helpers used by the partitioners.

pub mod centroid;

pub use centroid::{centroid, max_corner, mean_point};
