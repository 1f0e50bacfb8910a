pub mod classify;
pub mod header;
pub mod normalizer;
pub mod segment;
pub mod types;
pub mod utils;
pub mod workbook;
pub mod years;

pub use classify::{CategorySplit, KeywordClassifier};
pub use header::{locate_header, HeaderStrategy, MaxFilledRow};
pub use normalizer::{drop_empty, flatten_headers, HeaderLayout, SheetNormalizer};
pub use segment::BlockSegmenter;
pub use types::*;
pub use workbook::{ExcelWorkbook, MemoryWorkbook, Workbook, DEFAULT_MAX_GRID_CELLS};
pub use years::{extract_year_blocks, read_year_aligned, resolve_year_window};
