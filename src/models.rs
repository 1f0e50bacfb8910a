use calamine::Data;
use polars::prelude::{AnyValue, DataFrame};
use serde::Serialize;
use serde_json::Value;
use crate::services::excel::types::{SheetKind, Table, YearWindow};

/// Column labels plus rows of JSON cells, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableView {
    pub fn from_table(table: &Table) -> Self {
        Self {
            columns: table.columns.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(cell_json).collect())
                .collect(),
        }
    }

    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_column_names()
            .iter()
            .map(|&s| s.to_string())
            .collect();
        let rows = (0..df.height())
            .map(|row_idx| {
                df.get_columns()
                    .iter()
                    .map(|series| match series.get(row_idx) {
                        Ok(value) => any_value_json(value),
                        Err(e) => {
                            tracing::warn!("Error getting value at row {}: {}", row_idx, e);
                            Value::Null
                        }
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn number(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn cell_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Float(f) => number(*f),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn any_value_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => number(f64::from(v)),
        AnyValue::Float64(v) => number(v),
        AnyValue::String(v) => Value::String(v.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// One cell of a wide year table in long format, for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeltedValue {
    pub category: String,
    pub year: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileWarning {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTable {
    pub file: String,
    pub table: TableView,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearSummaryView {
    pub per_source: TableView,
    pub total: TableView,
    pub melted: Vec<MeltedValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSegments {
    pub file: String,
    pub markers: (i32, i32),
    pub blocks: Vec<TableView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub keyword: String,
    pub table: TableView,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileCategories {
    pub file: String,
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KostenDetail {
    pub segments: Vec<FileSegments>,
    pub categories: Vec<FileCategories>,
    pub fte_per_file: Option<TableView>,
    pub fte_totals: Option<TableView>,
    pub year_summary: Option<YearSummaryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileExtract {
    pub file: String,
    pub years: YearWindow,
    pub table: TableView,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessCaseDetail {
    pub extracts: Vec<FileExtract>,
    pub comparison: Option<TableView>,
    pub year_summary: Option<YearSummaryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericDetail {
    pub totals: Option<TableView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetDetail {
    Kosten(KostenDetail),
    BusinessCase(BusinessCaseDetail),
    Numeric(NumericDetail),
}

/// Everything one batch produced, plus what was skipped and why.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub sheet: SheetKind,
    pub files: Vec<FileTable>,
    pub warnings: Vec<FileWarning>,
    pub detail: SheetDetail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};

    #[test]
    fn table_view_maps_cells() {
        let table = Table::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![Data::String("x".into()), Data::Float(1.5), Data::Empty]],
        );
        let view = TableView::from_table(&table);
        assert_eq!(
            view.rows[0],
            vec![Value::from("x"), Value::from(1.5), Value::Null]
        );
    }

    #[test]
    fn frame_view_keeps_column_order() {
        let df = DataFrame::new(vec![
            Series::new("Function Type", vec!["Engineer".to_string()]),
            Series::new("Total FTE", vec![6.0]),
        ])
        .unwrap();
        let view = TableView::from_frame(&df);
        assert_eq!(view.columns, vec!["Function Type", "Total FTE"]);
        assert_eq!(view.rows[0], vec![Value::from("Engineer"), Value::from(6.0)]);
        assert_eq!(view.column_index("Total FTE"), Some(1));
    }
}
