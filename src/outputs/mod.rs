//! Output generation for the harvested datasets.
//!
//! # Submodules
//!
//! - [`csv`]: Writes the Articles and Comments tables as delimited files
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── Articles{suffix}.csv   # one row per stored article
//! └── Comments{suffix}.csv   # one row per flattened comment or reply
//! ```

pub mod csv;
