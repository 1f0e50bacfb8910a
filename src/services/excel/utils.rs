use calamine::Data;
use regex::Regex;
use std::collections::HashSet;

pub fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

pub fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(is_blank)
}

/// Cell rendered as a label; blank cells become the empty string.
pub fn cell_text(cell: &Data) -> String {
    if is_blank(cell) {
        String::new()
    } else {
        cell.to_string()
    }
}

/// Numeric value of a cell that is stored as a number. Text is not parsed.
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        _ => None,
    }
}

/// Best-effort numeric coercion: anything that is not a finite number is 0.
pub fn coerce_number(cell: &Data) -> f64 {
    let value = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::Bool(b) => f64::from(u8::from(*b)),
        Data::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// True when the label is a plain run of ASCII digits, e.g. "2024".
pub fn is_digit_label(label: &str) -> bool {
    Regex::new(r"^[0-9]+$").map_or(false, |re| re.is_match(label))
}

/// Returns `name`, or `name_<n>` when it was already taken.
pub fn unique_label(name: &str, existing_names: &mut HashSet<String>) -> String {
    let mut label = name.to_string();
    let mut counter = 1;
    while !existing_names.insert(label.clone()) {
        label = format!("{}_{}", name, counter);
        counter += 1;
    }
    label
}

/// Display label of an uploaded file: its name without the workbook extension.
pub fn file_label(file_name: &str) -> String {
    for ext in [".xlsx", ".xlsm", ".xls"] {
        let Some(split) = file_name.len().checked_sub(ext.len()) else {
            continue;
        };
        match (file_name.get(..split), file_name.get(split..)) {
            (Some(stem), Some(tail)) if tail.eq_ignore_ascii_case(ext) => return stem.to_string(),
            _ => {}
        }
    }
    file_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_is_lenient() {
        assert_eq!(coerce_number(&Data::String("n/a".into())), 0.0);
        assert_eq!(coerce_number(&Data::String(" 12.5 ".into())), 12.5);
        assert_eq!(coerce_number(&Data::String("NaN".into())), 0.0);
        assert_eq!(coerce_number(&Data::Empty), 0.0);
        assert_eq!(coerce_number(&Data::Int(3)), 3.0);
    }

    #[test]
    fn float_years_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(2024.0)), "2024");
        assert!(is_digit_label(&cell_text(&Data::Float(2024.0))));
        assert!(!is_digit_label("2024 €"));
        assert!(!is_digit_label(""));
    }

    #[test]
    fn unique_label_appends_counter() {
        let mut seen = HashSet::new();
        assert_eq!(unique_label("2023", &mut seen), "2023");
        assert_eq!(unique_label("2023", &mut seen), "2023_1");
        assert_eq!(unique_label("2023", &mut seen), "2023_2");
    }

    #[test]
    fn file_label_strips_extension() {
        assert_eq!(file_label("BUCA Cloud.xlsx"), "BUCA Cloud");
        assert_eq!(file_label("old.XLS"), "old");
        assert_eq!(file_label("notes"), "notes");
    }
}
