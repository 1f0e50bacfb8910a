#![allow(dead_code)]

use rust_xlsxwriter::Workbook;

#[derive(Debug, Clone, Copy)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Empty,
}

pub type Sheet = (&'static str, Vec<Vec<Cell>>);

/// Writes the given sheets to an in-memory xlsx file.
pub fn xlsx(sheets: &[Sheet]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => {
                        worksheet.write_string(r as u32, c as u16, *s).unwrap();
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r as u32, c as u16, *n).unwrap();
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

pub fn kosten(rows: &[(&'static str, f64)]) -> Sheet {
    let mut grid = vec![vec![Cell::Text("Functie"), Cell::Text("FTE")]];
    grid.extend(
        rows.iter()
            .map(|(role, fte)| vec![Cell::Text(*role), Cell::Number(*fte)]),
    );
    ("1. Kosten", grid)
}

pub fn assumptions(anchor: f64) -> Sheet {
    let mut grid = vec![Vec::new(); 15];
    grid[0] = vec![Cell::Text("Uitgangspunten")];
    grid[14] = vec![Cell::Empty, Cell::Text("Startjaar"), Cell::Number(anchor)];
    ("Uitgangspunten", grid)
}

/// Year header rows 4 and 24, each followed by 14 rows of `value`.
pub fn business_case(first_year: f64, value: f64) -> Sheet {
    let mut grid = vec![Vec::new(); 40];
    for header in [3usize, 23] {
        let mut labels = vec![Cell::Text("Omschrijving")];
        labels.extend((0..10).map(|offset| Cell::Number(first_year + offset as f64)));
        grid[header] = labels;
        for row in header + 1..=header + 14 {
            let mut cells = vec![Cell::Text("regel")];
            cells.extend((0..10).map(|_| Cell::Number(value)));
            grid[row] = cells;
        }
    }
    ("Business Case", grid)
}
