pub mod viewport;

pub use viewport::{column_count, compute_index_window, IndexWindow, ViewportState};
