pub mod blob_detector;
pub mod candidate;
pub mod candidate_filter;
pub mod frame;
pub mod geometry;
pub mod smoothing;
pub mod target_selector;
pub mod threshold;
