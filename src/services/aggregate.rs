use std::collections::{BTreeMap, BTreeSet, HashSet};
use polars::prelude::*;
use crate::error::AppError;
use crate::models::MeltedValue;
use crate::services::excel::types::{
    Table, FILE_COLUMN, FTE_COLUMN, FTE_MARKER, ROLE_COLUMN, ROLE_MARKERS, SOURCE_COLUMN,
    TOTAL_FTE_COLUMN, TOTAL_LABEL,
};
use crate::services::excel::utils::{cell_number, cell_text, coerce_number, is_blank, unique_label};

pub const YEAR_COLUMN: &str = "Year";
pub const LABEL_COLUMN: &str = "Column";

/// A table tagged with the file it came from.
pub type Labeled = (String, Table);

/// FTE per role, per file and summed across files.
#[derive(Debug, Clone)]
pub struct FteSummary {
    /// `Function Type`, `FTE`, `File`.
    pub per_file: DataFrame,
    /// `Function Type`, `Total FTE`.
    pub totals: DataFrame,
}

impl FteSummary {
    pub fn total_for(&self, role: &str) -> Option<f64> {
        let roles = self.totals.column(ROLE_COLUMN).ok()?.str().ok()?;
        let values = self.totals.column(TOTAL_FTE_COLUMN).ok()?.f64().ok()?;
        roles
            .into_iter()
            .zip(values.into_iter())
            .find_map(|(r, v)| if r == Some(role) { v } else { None })
    }
}

/// Sums FTE per role for every file that has both a role column (label
/// containing `Functie` or `Function`) and an `FTE` column, then sums the
/// per-file results per role. Files lacking either column are skipped.
pub fn aggregate_fte(files: &[Labeled]) -> Result<Option<FteSummary>, AppError> {
    let mut per_file: Option<DataFrame> = None;

    for (label, table) in files {
        let (Some(role_idx), Some(fte_idx)) =
            (table.find_column(&ROLE_MARKERS), table.find_column(&[FTE_MARKER]))
        else {
            tracing::debug!("{}: no role/FTE columns, skipping", label);
            continue;
        };

        let mut roles = Vec::new();
        let mut ftes = Vec::new();
        for row in &table.rows {
            if is_blank(&row[role_idx]) {
                continue;
            }
            roles.push(cell_text(&row[role_idx]));
            ftes.push(coerce_number(&row[fte_idx]));
        }

        let summary = DataFrame::new(vec![
            Series::new(ROLE_COLUMN, roles),
            Series::new(FTE_COLUMN, ftes),
        ])?
        .lazy()
        .group_by_stable([col(ROLE_COLUMN)])
        .agg([col(FTE_COLUMN).sum()])
        .with_column(lit(label.as_str()).alias(FILE_COLUMN))
        .collect()?;
        tracing::debug!("{}: {} roles", label, summary.height());

        per_file = Some(match per_file {
            Some(acc) => acc.vstack(&summary)?,
            None => summary,
        });
    }

    let Some(per_file) = per_file else {
        return Ok(None);
    };
    let totals = per_file
        .clone()
        .lazy()
        .group_by_stable([col(ROLE_COLUMN)])
        .agg([col(FTE_COLUMN).sum().alias(TOTAL_FTE_COLUMN)])
        .collect()?;

    Ok(Some(FteSummary { per_file, totals }))
}

/// How unioned rows are grouped by [`aggregate_years`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    /// By the file each row came from.
    Source,
    /// By the text of a named column; rows where it is blank are dropped.
    Column(String),
}

#[derive(Debug, Clone)]
pub struct YearSummary {
    pub key: String,
    pub columns: Vec<String>,
    pub per_group: DataFrame,
    /// One row labelled `Total`.
    pub total: DataFrame,
}

impl YearSummary {
    pub fn value(&self, group: &str, column: &str) -> Option<f64> {
        lookup(&self.per_group, &self.key, group, column)
    }

    pub fn total(&self, column: &str) -> Option<f64> {
        lookup(&self.total, &self.key, TOTAL_LABEL, column)
    }

    pub fn melt(&self) -> Result<Vec<MeltedValue>, AppError> {
        melt_frame(&self.per_group, &self.key)
    }
}

fn lookup(frame: &DataFrame, key: &str, group: &str, column: &str) -> Option<f64> {
    let keys = frame.column(key).ok()?.str().ok()?;
    let values = frame.column(column).ok()?.f64().ok()?;
    keys.into_iter()
        .zip(values.into_iter())
        .find_map(|(k, v)| if k == Some(group) { v } else { None })
}

/// Unions the rows of all files, keeps the columns whose label contains one of
/// `targets`, coerces them to numbers (anything unparseable is 0) and sums
/// them per group. A column missing from a file counts as 0 for its rows.
pub fn aggregate_years(
    files: &[Labeled],
    targets: &[String],
    group_by: &Grouping,
) -> Result<Option<YearSummary>, AppError> {
    let key = match group_by {
        Grouping::Source => SOURCE_COLUMN.to_string(),
        Grouping::Column(name) => name.clone(),
    };

    let mut keys: Vec<String> = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    let mut values: Vec<Vec<f64>> = Vec::new();

    for (label, table) in files {
        let key_idx = match group_by {
            Grouping::Source => None,
            Grouping::Column(name) => match table.columns.iter().position(|c| c == name) {
                Some(idx) => Some(idx),
                None => {
                    tracing::debug!("{}: no '{}' column, skipping", label, name);
                    continue;
                }
            },
        };

        let mut seen = HashSet::from([key.clone()]);
        let mut selected = Vec::new();
        for (idx, column) in table.columns.iter().enumerate() {
            if Some(idx) == key_idx || !targets.iter().any(|t| column.contains(t.as_str())) {
                continue;
            }
            let name = unique_label(column, &mut seen);
            let slot = match columns.iter().position(|existing| *existing == name) {
                Some(slot) => slot,
                None => {
                    columns.push(name);
                    values.push(vec![0.0; keys.len()]);
                    columns.len() - 1
                }
            };
            selected.push((idx, slot));
        }

        for row in &table.rows {
            let group = match key_idx {
                None => label.clone(),
                Some(idx) if is_blank(&row[idx]) => continue,
                Some(idx) => cell_text(&row[idx]),
            };
            keys.push(group);
            for column in values.iter_mut() {
                column.push(0.0);
            }
            let last = keys.len() - 1;
            for &(idx, slot) in &selected {
                values[slot][last] = coerce_number(&row[idx]);
            }
        }
    }

    if columns.is_empty() {
        return Ok(None);
    }

    let mut series = vec![Series::new(&key, keys)];
    series.extend(columns.iter().zip(values).map(|(name, v)| Series::new(name, v)));
    let sums: Vec<Expr> = columns.iter().map(|name| col(name).sum()).collect();
    let per_group = DataFrame::new(series)?
        .lazy()
        .group_by_stable([col(&key)])
        .agg(sums)
        .collect()?;

    let mut totals = vec![lit(TOTAL_LABEL).alias(&key)];
    totals.extend(columns.iter().map(|name| col(name).sum()));
    let total = per_group.clone().lazy().select(totals).collect()?;

    Ok(Some(YearSummary {
        key,
        columns,
        per_group,
        total,
    }))
}

/// Long format of a wide frame: one `(id, column, value)` triple per cell,
/// column by column.
pub fn melt_frame(frame: &DataFrame, id: &str) -> Result<Vec<MeltedValue>, AppError> {
    let ids = frame.column(id)?.cast(&DataType::String)?;
    let ids = ids.str()?;

    let mut melted = Vec::new();
    for series in frame.get_columns().iter().filter(|s| s.name() != id) {
        let numbers = series.cast(&DataType::Float64)?;
        for (category, value) in ids.into_iter().zip(numbers.f64()?.into_iter()) {
            melted.push(MeltedValue {
                category: category.unwrap_or_default().to_string(),
                year: series.name().to_string(),
                value: value.unwrap_or(0.0),
            });
        }
    }
    Ok(melted)
}

/// One row per year, one column per file. Repeated year columns inside a file
/// are added together; a year a file does not have counts as 0.
pub fn compare_by_year(extracts: &[Labeled]) -> Result<Option<DataFrame>, AppError> {
    if extracts.is_empty() {
        return Ok(None);
    }

    let per_file: Vec<BTreeMap<i64, f64>> = extracts
        .iter()
        .map(|(_, table)| {
            let mut sums = BTreeMap::new();
            for (idx, label) in table.columns.iter().enumerate() {
                let Ok(year) = label.parse::<i64>() else {
                    continue;
                };
                let total: f64 = table.column_values(idx).map(coerce_number).sum();
                *sums.entry(year).or_insert(0.0) += total;
            }
            sums
        })
        .collect();
    let years: BTreeSet<i64> = per_file.iter().flat_map(|sums| sums.keys().copied()).collect();

    let mut seen = HashSet::from([YEAR_COLUMN.to_string()]);
    let mut series = vec![Series::new(YEAR_COLUMN, years.iter().copied().collect::<Vec<i64>>())];
    for ((label, _), sums) in extracts.iter().zip(&per_file) {
        let name = unique_label(label, &mut seen);
        let column: Vec<f64> = years
            .iter()
            .map(|year| sums.get(year).copied().unwrap_or(0.0))
            .collect();
        series.push(Series::new(&name, column));
    }
    Ok(Some(DataFrame::new(series)?))
}

/// Per numeric column, its total in each file plus an overall `Total`.
/// A column is numeric when every non-empty cell holds a number.
pub fn numeric_totals(files: &[Labeled]) -> Result<Option<DataFrame>, AppError> {
    let mut labels: Vec<String> = Vec::new();
    let mut per_file: Vec<Vec<f64>> = Vec::with_capacity(files.len());

    for (_, table) in files {
        let mut totals = vec![0.0; labels.len()];
        let mut seen = HashSet::new();
        for idx in 0..table.width() {
            if !is_numeric_column(table, idx) {
                continue;
            }
            let name = unique_label(&table.columns[idx], &mut seen);
            let slot = match labels.iter().position(|existing| *existing == name) {
                Some(slot) => slot,
                None => {
                    labels.push(name);
                    totals.push(0.0);
                    labels.len() - 1
                }
            };
            totals[slot] += table.column_values(idx).filter_map(cell_number).sum::<f64>();
        }
        per_file.push(totals);
    }

    if labels.is_empty() {
        return Ok(None);
    }
    for totals in per_file.iter_mut() {
        totals.resize(labels.len(), 0.0);
    }

    let mut seen = HashSet::from([LABEL_COLUMN.to_string(), TOTAL_LABEL.to_string()]);
    let mut series = vec![Series::new(LABEL_COLUMN, labels.clone())];
    for ((label, _), totals) in files.iter().zip(&per_file) {
        series.push(Series::new(&unique_label(label, &mut seen), totals.clone()));
    }
    let overall: Vec<f64> = (0..labels.len())
        .map(|slot| per_file.iter().map(|totals| totals[slot]).sum())
        .collect();
    series.push(Series::new(TOTAL_LABEL, overall));

    Ok(Some(DataFrame::new(series)?))
}

fn is_numeric_column(table: &Table, idx: usize) -> bool {
    let mut any = false;
    for cell in table.column_values(idx) {
        if is_blank(cell) {
            continue;
        }
        if cell_number(cell).is_none() {
            return false;
        }
        any = true;
    }
    any
}
