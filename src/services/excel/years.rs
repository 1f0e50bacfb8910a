use calamine::Data;
use super::types::{
    Table, YearWindow, ANCHOR_CELL, ASSUMPTIONS_SHEET, YEAR_BLOCK_ROWS, YEAR_HEADER_ROWS,
};
use super::utils::{cell_text, is_blank, is_digit_label};
use super::workbook::Workbook;
use crate::error::AppError;

/// Reads the anchor year from the assumptions sheet (C15) and derives the
/// ten-year window around it.
///
/// Returns `None` when the sheet is missing, unreadable, or the cell does not
/// hold a year. Callers skip year-aligned extraction for that workbook.
pub fn resolve_year_window(workbook: &mut dyn Workbook) -> Option<YearWindow> {
    let grid = match workbook.grid(ASSUMPTIONS_SHEET) {
        Ok(grid) => grid,
        Err(e) => {
            tracing::debug!("Year window unresolved: {}", e);
            return None;
        }
    };
    let cell = grid.get(ANCHOR_CELL.0)?.get(ANCHOR_CELL.1)?;
    let anchor = anchor_year(cell)?;
    Some(YearWindow::from_anchor(anchor))
}

fn anchor_year(cell: &Data) -> Option<i32> {
    let year = match cell {
        Data::Int(i) => *i as f64,
        Data::Float(f) => f.trunc(),
        Data::String(s) => s.trim().parse::<i32>().ok()? as f64,
        _ => return None,
    };
    if year.is_finite() && year >= f64::from(i32::MIN) && year <= f64::from(i32::MAX) {
        Some(year as i32)
    } else {
        None
    }
}

/// Pulls the year blocks out of a raw business case grid.
///
/// Each candidate header row that mentions a window year labels the
/// [`YEAR_BLOCK_ROWS`] rows beneath it. Blocks are stacked with columns
/// aligned by label; a label repeated inside one block stays a separate
/// column. Only all-digit labels inside the window survive, and columns left
/// without data are dropped. `None` means no block qualified.
pub fn extract_year_blocks(grid: &[Vec<Data>], window: &YearWindow) -> Option<Table> {
    let needles: Vec<String> = window.years().iter().map(|y| y.to_string()).collect();

    let mut stacked = Table::default();
    let mut blocks = 0;
    for &header_row in YEAR_HEADER_ROWS.iter() {
        let Some(header) = grid.get(header_row) else {
            continue;
        };
        let labels: Vec<String> = header.iter().map(cell_text).collect();
        let qualifies = labels
            .iter()
            .filter(|label| !label.is_empty())
            .any(|label| needles.iter().any(|year| label.contains(year.as_str())));
        if !qualifies {
            continue;
        }

        let end = (header_row + 1 + YEAR_BLOCK_ROWS).min(grid.len());
        let data = grid.get(header_row + 1..end).unwrap_or_default();
        tracing::debug!("Year block at row {} with {} rows", header_row, data.len());
        append_aligned(&mut stacked, &labels, data);
        blocks += 1;
    }

    if blocks == 0 {
        return None;
    }

    let keep: Vec<usize> = stacked
        .columns
        .iter()
        .enumerate()
        .filter(|(_, label)| {
            is_digit_label(label)
                && label.parse::<i64>().map_or(false, |year| window.contains(year))
        })
        .map(|(idx, _)| idx)
        .collect();

    let columns: Vec<String> = keep.iter().map(|&idx| stacked.columns[idx].clone()).collect();
    let rows: Vec<Vec<Data>> = stacked
        .rows
        .iter()
        .map(|row| keep.iter().map(|&idx| row[idx].clone()).collect())
        .collect();

    let table = drop_blank_columns(Table::new(columns, rows));
    if table.width() == 0 {
        None
    } else {
        Some(table)
    }
}

/// Reads `sheet` and runs [`extract_year_blocks`] on it.
pub fn read_year_aligned(
    workbook: &mut dyn Workbook,
    sheet: &str,
    window: &YearWindow,
) -> Result<Option<Table>, AppError> {
    let grid = workbook.grid(sheet)?;
    Ok(extract_year_blocks(&grid, window))
}

/// Appends `rows` under `labels`, matching the n-th occurrence of a label to
/// the n-th existing column with that label and adding columns as needed.
fn append_aligned(stacked: &mut Table, labels: &[String], rows: &[Vec<Data>]) {
    let mut targets = Vec::with_capacity(labels.len());
    for (pos, label) in labels.iter().enumerate() {
        let occurrence = labels[..pos].iter().filter(|l| *l == label).count();
        let existing = stacked
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| *c == label)
            .map(|(idx, _)| idx)
            .nth(occurrence);
        let target = match existing {
            Some(idx) => idx,
            None => {
                stacked.columns.push(label.clone());
                for row in stacked.rows.iter_mut() {
                    row.push(Data::Empty);
                }
                stacked.columns.len() - 1
            }
        };
        targets.push(target);
    }

    for source in rows {
        let mut row = vec![Data::Empty; stacked.columns.len()];
        for (pos, &target) in targets.iter().enumerate() {
            if let Some(cell) = source.get(pos) {
                row[target] = cell.clone();
            }
        }
        stacked.rows.push(row);
    }
}

/// Drops columns without data but keeps blank rows, so block heights are preserved.
fn drop_blank_columns(table: Table) -> Table {
    let keep: Vec<usize> = (0..table.width())
        .filter(|&col| table.column_values(col).any(|c| !is_blank(c)))
        .collect();
    if keep.len() == table.width() {
        return table;
    }
    let columns = keep.iter().map(|&col| table.columns[col].clone()).collect();
    let rows = table
        .rows
        .iter()
        .map(|row| keep.iter().map(|&col| row[col].clone()).collect())
        .collect();
    Table::new(columns, rows)
}
