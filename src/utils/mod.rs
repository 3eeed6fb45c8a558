//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    array2_to_frame, column_names, column_to_array1, column_values, columns_to_array2,
    ensure_parent_dir, DataLoader, DataSaver,
};
