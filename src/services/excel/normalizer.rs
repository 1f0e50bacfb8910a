use std::str::FromStr;
use calamine::Data;
use super::header::{HeaderStrategy, MaxFilledRow};
use super::types::Table;
use super::utils::{cell_text, is_blank, is_blank_row};
use super::workbook::Workbook;
use crate::error::AppError;

/// How the header of a sheet is found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Densest row, see [`MaxFilledRow`].
    #[default]
    Detect,
    /// Stacked header rows flattened into one label per column.
    Rows(Vec<usize>),
}

impl FromStr for HeaderLayout {
    type Err = AppError;

    /// `detect` (or nothing) for [`HeaderLayout::Detect`], otherwise a comma
    /// separated list of zero-based row indices such as `1,3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("detect") {
            return Ok(HeaderLayout::Detect);
        }
        let rows = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| AppError::InvalidInput(format!("'{}' is not a header row", part)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Err(AppError::InvalidInput("No header rows given".to_string()));
        }
        Ok(HeaderLayout::Rows(rows))
    }
}

/// Turns a named sheet into a [`Table`] without blank rows or columns.
pub struct SheetNormalizer<S = MaxFilledRow> {
    strategy: S,
    min_confidence: f64,
}

impl SheetNormalizer<MaxFilledRow> {
    pub fn new(min_confidence: f64) -> Self {
        Self::with_strategy(MaxFilledRow, min_confidence)
    }
}

impl Default for SheetNormalizer<MaxFilledRow> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<S: HeaderStrategy> SheetNormalizer<S> {
    pub fn with_strategy(strategy: S, min_confidence: f64) -> Self {
        Self { strategy, min_confidence }
    }

    pub fn read(
        &self,
        workbook: &mut dyn Workbook,
        sheet: &str,
        layout: &HeaderLayout,
    ) -> Result<Table, AppError> {
        let grid = workbook.grid(sheet)?;
        tracing::debug!("Normalizing sheet {} ({} raw rows)", sheet, grid.len());
        match layout {
            HeaderLayout::Detect => self.normalize_grid(sheet, &grid),
            HeaderLayout::Rows(rows) => flatten_headers(&grid, rows),
        }
    }

    pub fn normalize_grid(&self, sheet: &str, grid: &[Vec<Data>]) -> Result<Table, AppError> {
        let guess = self
            .strategy
            .locate(grid)
            .ok_or_else(|| AppError::NoHeader(sheet.to_string()))?;

        if guess.confidence < self.min_confidence {
            return Err(AppError::LowConfidenceHeader {
                sheet: sheet.to_string(),
                row: guess.row,
                confidence: guess.confidence,
                threshold: self.min_confidence,
            });
        }
        tracing::debug!(
            "Sheet {}: header at row {} ({} filled, confidence {:.2})",
            sheet,
            guess.row,
            guess.filled,
            guess.confidence
        );

        let columns = grid[guess.row].iter().map(cell_text).collect();
        let rows = grid[guess.row + 1..].to_vec();
        Ok(drop_empty(Table::new(columns, rows)))
    }
}

/// Builds labels from several header rows. Upper levels are carried forward
/// across blank cells so merged header blocks label every column beneath them;
/// the non-empty levels are joined with `_`.
pub fn flatten_headers(grid: &[Vec<Data>], header_rows: &[usize]) -> Result<Table, AppError> {
    let Some(&last) = header_rows.iter().max() else {
        return Err(AppError::InvalidInput("No header rows given".to_string()));
    };
    let width = grid.iter().map(|row| row.len()).max().unwrap_or(0);

    let levels: Vec<Vec<String>> = header_rows
        .iter()
        .enumerate()
        .map(|(level, &row_idx)| {
            let mut labels: Vec<String> = (0..width)
                .map(|col| {
                    grid.get(row_idx)
                        .and_then(|row| row.get(col))
                        .map(cell_text)
                        .unwrap_or_default()
                })
                .collect();
            if level + 1 < header_rows.len() {
                let mut carried = String::new();
                for label in labels.iter_mut() {
                    if label.is_empty() {
                        label.clone_from(&carried);
                    } else {
                        carried.clone_from(label);
                    }
                }
            }
            labels
        })
        .collect();

    let columns = (0..width)
        .map(|col| {
            levels
                .iter()
                .map(|labels| labels[col].as_str())
                .filter(|label| !label.is_empty())
                .collect::<Vec<_>>()
                .join("_")
        })
        .collect();

    let rows = grid.get(last + 1..).map(<[_]>::to_vec).unwrap_or_default();
    Ok(drop_empty(Table::new(columns, rows)))
}

/// Removes rows, then columns, that hold no data. Labels do not count as data.
pub fn drop_empty(table: Table) -> Table {
    let Table { columns, rows } = table;
    let rows: Vec<Vec<Data>> = rows.into_iter().filter(|row| !is_blank_row(row)).collect();

    let keep: Vec<usize> = (0..columns.len())
        .filter(|&col| rows.iter().any(|row| row.get(col).map_or(false, |c| !is_blank(c))))
        .collect();

    let columns = keep.iter().map(|&col| columns[col].clone()).collect();
    let rows = rows
        .into_iter()
        .map(|row| keep.iter().map(|&col| row[col].clone()).collect())
        .collect();
    Table::new(columns, rows)
}
