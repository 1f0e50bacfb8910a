use std::io::Cursor;
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use crate::error::AppError;
use super::types::Grid;

/// Read-only access to the sheets of one uploaded workbook.
pub trait Workbook {
    fn sheet_names(&self) -> Vec<String>;

    /// Headerless grid of `sheet`, addressed from A1 and padded to a rectangle.
    fn grid(&mut self, sheet: &str) -> Result<Grid, AppError>;

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet_names().iter().any(|name| name == sheet)
    }
}

/// Largest grid, in cells, a sheet may expand to when addressed from A1.
pub const DEFAULT_MAX_GRID_CELLS: usize = 5_000_000;

/// Workbook backed by uploaded `.xls` / `.xlsx` bytes.
pub struct ExcelWorkbook {
    sheets: Sheets<Cursor<Bytes>>,
    max_cells: usize,
}

impl ExcelWorkbook {
    pub fn from_bytes(file_data: Bytes) -> Result<Self, AppError> {
        let cursor = Cursor::new(file_data);
        let sheets = open_workbook_auto_from_rs(cursor).map_err(|e| {
            tracing::error!("Failed to open workbook: {}", e);
            AppError::Workbook(format!("Failed to open workbook: {}", e))
        })?;
        Ok(Self {
            sheets,
            max_cells: DEFAULT_MAX_GRID_CELLS,
        })
    }

    pub fn with_cell_limit(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }
}

impl Workbook for ExcelWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    fn grid(&mut self, sheet: &str) -> Result<Grid, AppError> {
        if !self.has_sheet(sheet) {
            return Err(AppError::MissingSheet(sheet.to_string()));
        }
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| AppError::Workbook(format!("Failed to read worksheet {}: {}", sheet, e)))?;
        absolute_grid(&range, self.max_cells)
            .map_err(|e| AppError::Workbook(format!("Sheet {}: {}", sheet, e)))
    }
}

/// Expands a calamine range, which starts at the first used cell, into a grid
/// that starts at A1. Fails before allocating when the grid would exceed
/// `max_cells`.
pub fn absolute_grid(range: &Range<Data>, max_cells: usize) -> Result<Grid, String> {
    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return Ok(Vec::new());
    };
    let height = end.0 as usize + 1;
    let width = end.1 as usize + 1;
    match height.checked_mul(width) {
        Some(cells) if cells <= max_cells => {}
        _ => {
            return Err(format!(
                "used range reaches row {} column {}, over the {} cell limit",
                height, width, max_cells
            ))
        }
    }
    let mut grid = vec![vec![Data::Empty; width]; height];
    for (row, col, value) in range.cells() {
        grid[start.0 as usize + row][start.1 as usize + col] = value.clone();
    }
    Ok(grid)
}

/// Workbook held entirely in memory, for callers that already have grids.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, Grid)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>, grid: Grid) -> Self {
        self.sheets.push((name.into(), grid));
        self
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn grid(&mut self, sheet: &str) -> Result<Grid, AppError> {
        let (_, grid) = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .ok_or_else(|| AppError::MissingSheet(sheet.to_string()))?;
        let width = grid.iter().map(|row| row.len()).max().unwrap_or(0);
        Ok(grid
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, Data::Empty);
                row
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_workbook_pads_rows() {
        let mut workbook = MemoryWorkbook::new().with_sheet(
            "Budget GL",
            vec![vec![Data::Float(1.0)], vec![Data::Empty, Data::Float(2.0)]],
        );
        let grid = workbook.grid("Budget GL").unwrap();
        assert_eq!(grid[0], vec![Data::Float(1.0), Data::Empty]);
        assert_eq!(grid[1].len(), 2);
    }

    #[test]
    fn missing_sheet_is_reported() {
        let mut workbook = MemoryWorkbook::new();
        assert!(matches!(
            workbook.grid("Budget SAM"),
            Err(AppError::MissingSheet(name)) if name == "Budget SAM"
        ));
    }

    #[test]
    fn absolute_grid_keeps_leading_offset() {
        let mut range = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("x".into()));
        range.set_value((3, 2), Data::Float(5.0));
        let grid = absolute_grid(&range, 12).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0].len(), 3);
        assert_eq!(grid[2][1], Data::String("x".into()));
        assert_eq!(grid[3][2], Data::Float(5.0));
        assert_eq!(grid[0][0], Data::Empty);

        assert!(absolute_grid(&range, 11).is_err());
    }

    #[test]
    fn stray_far_cell_is_rejected() {
        let mut range = Range::new((1_048_575, 16_383), (1_048_575, 16_383));
        range.set_value((1_048_575, 16_383), Data::Float(1.0));
        let err = absolute_grid(&range, DEFAULT_MAX_GRID_CELLS).unwrap_err();
        assert!(err.contains("cell limit"));
    }
}
