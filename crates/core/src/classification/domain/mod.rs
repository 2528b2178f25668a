pub mod classification;
pub mod region_classifier;
