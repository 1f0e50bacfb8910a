use calamine::Data;
use super::types::{Table, YearWindow, MARKER_COLUMNS};
use super::utils::cell_number;

/// Splits a table into sub-tables at repeated year header rows.
///
/// A row is a marker when the cells at `columns` hold exactly the two marker
/// years as numbers. Each marker opens a new sub-table. Rows seen before the
/// first marker are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSegmenter {
    pub columns: (usize, usize),
    pub markers: (f64, f64),
}

impl BlockSegmenter {
    pub fn new(columns: (usize, usize), markers: (i32, i32)) -> Self {
        Self {
            columns,
            markers: (f64::from(markers.0), f64::from(markers.1)),
        }
    }

    /// Markers are the first two window years in columns E and F.
    pub fn for_window(window: &YearWindow) -> Self {
        Self::new(MARKER_COLUMNS, window.leading_pair())
    }

    pub fn is_marker(&self, row: &[Data]) -> bool {
        let at = |idx: usize| row.get(idx).and_then(cell_number);
        at(self.columns.0) == Some(self.markers.0) && at(self.columns.1) == Some(self.markers.1)
    }

    pub fn split(&self, table: &Table) -> Vec<Table> {
        let mut blocks = Vec::new();
        let mut buffer: Vec<Vec<Data>> = Vec::new();

        for row in &table.rows {
            if self.is_marker(row) {
                if !buffer.is_empty() {
                    blocks.push(Table::new(table.columns.clone(), std::mem::take(&mut buffer)));
                }
                buffer.push(row.clone());
            } else if !buffer.is_empty() {
                buffer.push(row.clone());
            }
        }

        if !buffer.is_empty() {
            blocks.push(Table::new(table.columns.clone(), buffer));
        }
        blocks
    }
}
