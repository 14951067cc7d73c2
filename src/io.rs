//! Reading and writing point data on disk.
//!
//! Scans and slices are stored as plain delimited text with one `x,y` pair per line and no
//! header, the layout earlier captures were written in.

mod point_list;
mod scan_files;

pub use point_list::{parse_points, points_to_bytes, read_points, write_points, write_points_to};
pub use scan_files::{
    list_point_files, load_slice, save_scan, save_slice, scan_file_name, scan_to_bytes,
    validate_slice_name,
};
