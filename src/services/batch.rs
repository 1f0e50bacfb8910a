use std::collections::BTreeSet;
use bytes::Bytes;
use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    BatchReport, BusinessCaseDetail, CategoryView, FileCategories, FileExtract, FileSegments,
    FileTable, FileWarning, KostenDetail, NumericDetail, SheetDetail, TableView, YearSummaryView,
};
use crate::services::aggregate::{
    aggregate_fte, aggregate_years, compare_by_year, numeric_totals, Grouping, Labeled,
    YearSummary,
};
use crate::services::excel::{
    read_year_aligned, resolve_year_window, BlockSegmenter, ExcelWorkbook, HeaderLayout,
    KeywordClassifier, SheetKind, SheetNormalizer, Table, Workbook, YearWindow, COST_CATEGORIES,
    MARKER_COLUMNS,
};
use crate::services::excel::utils::file_label;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn label(&self) -> String {
        file_label(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub sheet: SheetKind,
    pub layout: HeaderLayout,
    pub min_header_confidence: f64,
    /// Used when a workbook has no resolvable year window.
    pub fallback_years: Vec<i32>,
    pub max_file_size: usize,
    pub max_grid_cells: usize,
}

impl BatchOptions {
    pub fn new(sheet: SheetKind) -> Self {
        Self::from_config(sheet, &Config::default())
    }

    pub fn from_config(sheet: SheetKind, config: &Config) -> Self {
        Self {
            sheet,
            layout: HeaderLayout::Detect,
            min_header_confidence: config.min_header_confidence,
            fallback_years: config.fallback_years.clone(),
            max_file_size: config.max_file_size,
            max_grid_cells: config.max_grid_cells,
        }
    }

    pub fn with_layout(mut self, layout: HeaderLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// A workbook that yielded a table for the selected sheet.
struct LoadedFile {
    label: String,
    workbook: Box<dyn Workbook>,
    table: Table,
    window: Option<YearWindow>,
}

/// Opens every upload and runs the batch. A file that cannot be opened is
/// reported as a warning; the rest of the batch carries on.
pub fn process_batch(uploads: Vec<Upload>, options: &BatchOptions) -> Result<BatchReport, AppError> {
    tracing::info!("Processing {} uploads for sheet {}", uploads.len(), options.sheet);

    let workbooks = uploads
        .into_iter()
        .map(|upload| {
            let label = upload.label();
            let opened = if upload.bytes.len() > options.max_file_size {
                Err(AppError::InvalidInput(format!(
                    "File is {}KB, limit is {}KB",
                    upload.bytes.len() / 1024,
                    options.max_file_size / 1024
                )))
            } else {
                ExcelWorkbook::from_bytes(upload.bytes).map(|workbook| {
                    Box::new(workbook.with_cell_limit(options.max_grid_cells)) as Box<dyn Workbook>
                })
            };
            (label, opened)
        })
        .collect();

    process_workbooks(workbooks, options)
}

/// Runs the batch over already opened workbooks.
pub fn process_workbooks(
    workbooks: Vec<(String, Result<Box<dyn Workbook>, AppError>)>,
    options: &BatchOptions,
) -> Result<BatchReport, AppError> {
    let start = std::time::Instant::now();
    let sheet = options.sheet;
    let normalizer = SheetNormalizer::new(options.min_header_confidence);

    let outcomes: Vec<(String, Result<LoadedFile, AppError>)> = workbooks
        .into_iter()
        .map(|(label, opened)| {
            let loaded = opened.and_then(|mut workbook| {
                let table = normalizer.read(workbook.as_mut(), sheet.as_str(), &options.layout)?;
                let window = resolve_year_window(workbook.as_mut());
                Ok(LoadedFile {
                    label: label.clone(),
                    workbook,
                    table,
                    window,
                })
            });
            (label, loaded)
        })
        .collect();

    let mut warnings = Vec::new();
    let mut loaded = Vec::new();
    for (label, outcome) in outcomes {
        match outcome {
            Ok(file) => loaded.push(file),
            Err(e) => warn_file(&mut warnings, &label, &e),
        }
    }
    tracing::info!(
        "{} of {} files usable for sheet {}",
        loaded.len(),
        loaded.len() + warnings.len(),
        sheet
    );

    let files = loaded
        .iter()
        .map(|file| FileTable {
            file: file.label.clone(),
            table: TableView::from_table(&file.table),
        })
        .collect();

    let detail = match sheet {
        SheetKind::Kosten => SheetDetail::Kosten(kosten_detail(&loaded, options)?),
        SheetKind::BusinessCase => {
            SheetDetail::BusinessCase(business_case_detail(&mut loaded, options, &mut warnings)?)
        }
        _ => SheetDetail::Numeric(NumericDetail {
            totals: numeric_totals(&labeled(&loaded))?.as_ref().map(TableView::from_frame),
        }),
    };

    tracing::info!("Batch for sheet {} completed in {:?}", sheet, start.elapsed());
    Ok(BatchReport {
        sheet,
        files,
        warnings,
        detail,
    })
}

fn warn_file(warnings: &mut Vec<FileWarning>, file: &str, error: &AppError) {
    tracing::warn!("Skipping {}: {}", file, error);
    warnings.push(FileWarning {
        file: file.to_string(),
        message: error.to_string(),
    });
}

fn labeled(files: &[LoadedFile]) -> Vec<Labeled> {
    files
        .iter()
        .map(|file| (file.label.clone(), file.table.clone()))
        .collect()
}

/// Years to sum over: every resolved window, or the fallback years when no
/// workbook resolved one.
fn target_years(windows: impl Iterator<Item = YearWindow>, fallback: &[i32]) -> Vec<String> {
    let mut years: BTreeSet<i32> = windows.flat_map(|w| w.years().to_vec()).collect();
    if years.is_empty() {
        years.extend(fallback.iter().copied());
    }
    years.into_iter().map(|y| y.to_string()).collect()
}

fn summary_view(summary: Option<YearSummary>) -> Result<Option<YearSummaryView>, AppError> {
    summary
        .map(|summary| {
            Ok(YearSummaryView {
                per_source: TableView::from_frame(&summary.per_group),
                total: TableView::from_frame(&summary.total),
                melted: summary.melt()?,
            })
        })
        .transpose()
}

fn kosten_detail(files: &[LoadedFile], options: &BatchOptions) -> Result<KostenDetail, AppError> {
    let classifier = KeywordClassifier::new(COST_CATEGORIES)?;
    let fallback_markers = match options.fallback_years.as_slice() {
        [first, second, ..] => Some((*first, *second)),
        _ => None,
    };

    let mut segments = Vec::new();
    let mut categories = Vec::new();
    for file in files {
        let segmenter = match (file.window, fallback_markers) {
            (Some(window), _) => Some(BlockSegmenter::for_window(&window)),
            (None, Some(markers)) => Some(BlockSegmenter::new(MARKER_COLUMNS, markers)),
            (None, None) => None,
        };
        if let Some(segmenter) = segmenter {
            let blocks = segmenter.split(&file.table);
            tracing::debug!("{}: {} blocks", file.label, blocks.len());
            segments.push(FileSegments {
                file: file.label.clone(),
                markers: (segmenter.markers.0 as i32, segmenter.markers.1 as i32),
                blocks: blocks.iter().map(TableView::from_table).collect(),
            });
        }

        categories.push(FileCategories {
            file: file.label.clone(),
            categories: classifier
                .split(&file.table)
                .iter()
                .map(|(keyword, table)| CategoryView {
                    keyword: keyword.to_string(),
                    table: TableView::from_table(table),
                })
                .collect(),
        });
    }

    let tables = labeled(files);
    let fte = aggregate_fte(&tables)?;
    let targets = target_years(files.iter().filter_map(|f| f.window), &options.fallback_years);
    let year_summary = aggregate_years(&tables, &targets, &Grouping::Source)?;

    Ok(KostenDetail {
        segments,
        categories,
        fte_per_file: fte.as_ref().map(|s| TableView::from_frame(&s.per_file)),
        fte_totals: fte.as_ref().map(|s| TableView::from_frame(&s.totals)),
        year_summary: summary_view(year_summary)?,
    })
}

fn business_case_detail(
    files: &mut [LoadedFile],
    options: &BatchOptions,
    warnings: &mut Vec<FileWarning>,
) -> Result<BusinessCaseDetail, AppError> {
    let mut extracts = Vec::new();
    let mut aligned: Vec<Labeled> = Vec::new();

    for file in files.iter_mut() {
        let Some(window) = file.window else {
            tracing::info!("{}: year window unresolved, skipping year alignment", file.label);
            continue;
        };
        match read_year_aligned(file.workbook.as_mut(), options.sheet.as_str(), &window) {
            Ok(Some(table)) => {
                tracing::info!(
                    "{}: {} rows across years {:?}",
                    file.label,
                    table.height(),
                    window.years()
                );
                extracts.push(FileExtract {
                    file: file.label.clone(),
                    years: window,
                    table: TableView::from_table(&table),
                });
                aligned.push((file.label.clone(), table));
            }
            Ok(None) => tracing::info!("{}: no year block found", file.label),
            Err(e) => warn_file(warnings, &file.label, &e),
        }
    }

    let comparison = compare_by_year(&aligned)?;
    let targets = target_years(files.iter().filter_map(|f| f.window), &options.fallback_years);
    let year_summary = aggregate_years(&aligned, &targets, &Grouping::Source)?;

    Ok(BusinessCaseDetail {
        extracts,
        comparison: comparison.as_ref().map(TableView::from_frame),
        year_summary: summary_view(year_summary)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;
    use serde_json::Value;
    use crate::services::excel::MemoryWorkbook;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn opened(label: &str, workbook: MemoryWorkbook) -> (String, Result<Box<dyn Workbook>, AppError>) {
        (label.to_string(), Ok(Box::new(workbook) as Box<dyn Workbook>))
    }

    fn kosten_sheet(rows: &[(&str, &str, f64)]) -> Vec<Vec<Data>> {
        let mut grid = vec![
            vec![text("Kosten"), Data::Empty, Data::Empty],
            vec![text("Functie"), text("Categorie"), text("FTE")],
        ];
        for (role, category, fte) in rows {
            grid.push(vec![text(role), text(category), Data::Float(*fte)]);
        }
        grid
    }

    #[test]
    fn missing_sheet_becomes_warning() {
        let workbooks = vec![
            opened(
                "a",
                MemoryWorkbook::new().with_sheet(
                    "1. Kosten",
                    kosten_sheet(&[("Engineer", "Operationele Personeelskosten", 2.0)]),
                ),
            ),
            opened("b", MemoryWorkbook::new().with_sheet("Business Case", vec![])),
            ("c".to_string(), Err(AppError::Workbook("corrupt".into()))),
        ];
        let report = process_workbooks(workbooks, &BatchOptions::new(SheetKind::Kosten)).unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0].file, "b");
        assert!(report.warnings[0].message.contains("1. Kosten"));
        assert_eq!(report.warnings[1].file, "c");
    }

    #[test]
    fn kosten_batch_aggregates_fte_and_categories() {
        let workbooks = vec![
            opened(
                "a",
                MemoryWorkbook::new().with_sheet(
                    "1. Kosten",
                    kosten_sheet(&[
                        ("Engineer", "Operationele Personeelskosten", 2.0),
                        ("Engineer", "Ontwikkeling Personeelskosten", 3.0),
                    ]),
                ),
            ),
            opened(
                "b",
                MemoryWorkbook::new().with_sheet(
                    "1. Kosten",
                    kosten_sheet(&[("Engineer", "Overige kosten", 1.0)]),
                ),
            ),
        ];
        let report = process_workbooks(workbooks, &BatchOptions::new(SheetKind::Kosten)).unwrap();
        let SheetDetail::Kosten(detail) = report.detail else {
            panic!("expected kosten detail");
        };

        let totals = detail.fte_totals.unwrap();
        assert_eq!(totals.rows, vec![vec![Value::from("Engineer"), Value::from(6.0)]]);
        assert_eq!(detail.categories[0].categories.len(), 2);
        assert_eq!(detail.categories[1].categories[0].keyword, "Overige kosten");
        assert!(detail.year_summary.is_none());
    }

    fn business_case_workbook(anchor: f64, value: f64) -> MemoryWorkbook {
        let mut assumptions = vec![vec![Data::Empty; 3]; 15];
        assumptions[14][2] = Data::Float(anchor);

        let mut sheet = vec![vec![Data::Empty; 4]; 20];
        sheet[0][0] = text("Business Case");
        sheet[3] = vec![
            text("Omschrijving"),
            Data::Float(anchor - 1.0),
            Data::Float(anchor),
            text("Totaal"),
        ];
        sheet[4] = vec![text("Omzet"), Data::Float(value), Data::Float(value), Data::Empty];
        sheet[5] = vec![text("Kosten"), text("n/a"), Data::Float(value), Data::Empty];

        MemoryWorkbook::new()
            .with_sheet("Uitgangspunten", assumptions)
            .with_sheet("Business Case", sheet)
    }

    #[test]
    fn business_case_batch_compares_years() {
        let workbooks = vec![
            opened("a", business_case_workbook(2024.0, 100.0)),
            opened("b", business_case_workbook(2024.0, 50.0)),
            opened(
                "c",
                MemoryWorkbook::new().with_sheet("Business Case", vec![vec![text("leeg")]]),
            ),
        ];
        let report =
            process_workbooks(workbooks, &BatchOptions::new(SheetKind::BusinessCase)).unwrap();
        assert_eq!(report.files.len(), 3);
        let SheetDetail::BusinessCase(detail) = report.detail else {
            panic!("expected business case detail");
        };

        assert_eq!(detail.extracts.len(), 2);
        let comparison = detail.comparison.unwrap();
        assert_eq!(comparison.columns, vec!["Year", "a", "b"]);
        assert_eq!(comparison.rows[0], vec![Value::from(2023), Value::from(100.0), Value::from(50.0)]);
        assert_eq!(comparison.rows[1], vec![Value::from(2024), Value::from(200.0), Value::from(100.0)]);

        let summary = detail.year_summary.unwrap();
        assert_eq!(summary.total.rows[0][0], Value::from("Total"));
        assert_eq!(summary.melted.len(), 4);
    }

    #[test]
    fn business_case_without_year_block_is_left_out() {
        let mut unmatched = vec![vec![Data::Empty; 3]; 6];
        unmatched[3] = vec![text("Omschrijving"), Data::Float(1990.0), Data::Float(1991.0)];
        unmatched[4] = vec![text("Omzet"), Data::Float(7.0), Data::Float(7.0)];
        let mut assumptions = vec![vec![Data::Empty; 3]; 15];
        assumptions[14][2] = Data::Float(2024.0);

        let workbooks = vec![
            opened("a", business_case_workbook(2024.0, 100.0)),
            opened(
                "oud",
                MemoryWorkbook::new()
                    .with_sheet("Uitgangspunten", assumptions)
                    .with_sheet("Business Case", unmatched),
            ),
            opened("b", business_case_workbook(2024.0, 50.0)),
        ];
        let report =
            process_workbooks(workbooks, &BatchOptions::new(SheetKind::BusinessCase)).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.files.len(), 3);
        let SheetDetail::BusinessCase(detail) = report.detail else {
            panic!("expected business case detail");
        };

        let extracted: Vec<&str> = detail.extracts.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(extracted, vec!["a", "b"]);
        let comparison = detail.comparison.unwrap();
        assert_eq!(comparison.columns, vec!["Year", "a", "b"]);
        assert_eq!(comparison.rows[1], vec![Value::from(2024), Value::from(200.0), Value::from(100.0)]);
    }

    #[test]
    fn stacked_kosten_headers_reach_year_summary() {
        let grid = vec![
            vec![text("Kosten overzicht"), Data::Empty, Data::Empty, Data::Empty],
            vec![text("Functie"), text("Categorie"), text("2023"), Data::Empty],
            vec![Data::Empty; 4],
            vec![Data::Empty, Data::Empty, text("FTE"), text("Kosten")],
            vec![text("Engineer"), text("Operationele Personeelskosten"), Data::Float(2.0), Data::Float(100.0)],
            vec![text("Engineer"), text("Overige kosten"), Data::Float(1.0), Data::Float(50.0)],
        ];
        let workbooks = vec![opened("a", MemoryWorkbook::new().with_sheet("1. Kosten", grid))];
        let options =
            BatchOptions::new(SheetKind::Kosten).with_layout(HeaderLayout::Rows(vec![1, 3]));
        let report = process_workbooks(workbooks, &options).unwrap();
        assert_eq!(
            report.files[0].table.columns,
            vec!["Functie", "Categorie", "2023_FTE", "2023_Kosten"]
        );
        let SheetDetail::Kosten(detail) = report.detail else {
            panic!("expected kosten detail");
        };

        let summary = detail.year_summary.unwrap();
        assert_eq!(summary.per_source.columns, vec!["BUCA", "2023_FTE", "2023_Kosten"]);
        assert_eq!(
            summary.total.rows[0],
            vec![Value::from("Total"), Value::from(3.0), Value::from(150.0)]
        );
        let totals = detail.fte_totals.unwrap();
        assert_eq!(totals.rows, vec![vec![Value::from("Engineer"), Value::from(3.0)]]);
    }

    #[test]
    fn other_sheets_get_numeric_totals() {
        let grid = vec![
            vec![text("Post"), text("Bedrag")],
            vec![text("Licenties"), Data::Float(10.0)],
            vec![text("Hosting"), Data::Float(5.0)],
        ];
        let workbooks = vec![
            opened("a", MemoryWorkbook::new().with_sheet("Budget GL", grid.clone())),
            opened("b", MemoryWorkbook::new().with_sheet("Budget GL", grid)),
        ];
        let report = process_workbooks(workbooks, &BatchOptions::new(SheetKind::BudgetGl)).unwrap();
        let SheetDetail::Numeric(detail) = report.detail else {
            panic!("expected numeric detail");
        };
        let totals = detail.totals.unwrap();
        assert_eq!(totals.columns, vec!["Column", "a", "b", "Total"]);
        assert_eq!(totals.rows[0][3], Value::from(30.0));
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let mut options = BatchOptions::new(SheetKind::Kosten);
        options.max_file_size = 4;
        let report = process_batch(vec![Upload::new("big.xlsx", vec![0u8; 16])], &options).unwrap();
        assert_eq!(report.warnings[0].file, "big");
        assert!(report.files.is_empty());
    }

    #[test]
    fn target_years_prefer_windows() {
        let windows = vec![YearWindow::from_anchor(2024), YearWindow::from_anchor(2025)];
        let years = target_years(windows.into_iter(), &[2000]);
        assert_eq!(years.first().map(String::as_str), Some("2022"));
        assert_eq!(years.last().map(String::as_str), Some("2032"));
        assert_eq!(target_years(std::iter::empty(), &[2000]), vec!["2000"]);
    }
}
