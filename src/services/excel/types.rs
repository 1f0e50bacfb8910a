use calamine::Data;
use serde::Serialize;
use std::str::FromStr;

use crate::error::AppError;

/// Headerless cell grid, row-major. Row 0 / column 0 is cell A1.
pub type Grid = Vec<Vec<Data>>;

/// Sheet holding the general assumptions; only the anchor cell is read from it.
pub const ASSUMPTIONS_SHEET: &str = "Uitgangspunten";
/// Anchor year position in the assumptions sheet (C15).
pub const ANCHOR_CELL: (usize, usize) = (14, 2);
pub const WINDOW_LEN: usize = 10;
/// Index of the anchor year within the window.
pub const ANCHOR_OFFSET: usize = 2;

/// Candidate year header rows in the business case sheet (rows 4 and 24).
pub const YEAR_HEADER_ROWS: [usize; 2] = [3, 23];
pub const YEAR_BLOCK_ROWS: usize = 14;

/// Column positions checked by the block segmenter (E and F).
pub const MARKER_COLUMNS: (usize, usize) = (4, 5);

pub const COST_CATEGORIES: [&str; 4] = [
    "Operationele Personeelskosten",
    "Ontwikkeling Personeelskosten",
    "Materiële kosten",
    "Overige kosten",
];

pub const ROLE_MARKERS: [&str; 2] = ["Functie", "Function"];
pub const FTE_MARKER: &str = "FTE";

/// Identity column added to rows unioned across files.
pub const SOURCE_COLUMN: &str = "BUCA";
pub const ROLE_COLUMN: &str = "Function Type";
pub const FTE_COLUMN: &str = "FTE";
pub const TOTAL_FTE_COLUMN: &str = "Total FTE";
pub const FILE_COLUMN: &str = "File";
pub const TOTAL_LABEL: &str = "Total";

/// Tabular data with verbatim column labels. Labels may repeat or be blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl Table {
    /// Builds a table, padding or truncating every row to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Data>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Data::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// First column whose label contains any of `needles`.
    pub fn find_column(&self, needles: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|label| needles.iter().any(|needle| label.contains(needle)))
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Data> + '_ {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Data::Empty))
    }

    /// Header row followed by the data rows, as a raw grid.
    pub fn to_grid(&self) -> Grid {
        let header = self
            .columns
            .iter()
            .map(|label| {
                if label.is_empty() {
                    Data::Empty
                } else {
                    Data::String(label.clone())
                }
            })
            .collect();
        std::iter::once(header).chain(self.rows.iter().cloned()).collect()
    }
}

/// Ten consecutive years with the anchor year at index 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearWindow([i32; WINDOW_LEN]);

impl YearWindow {
    pub fn from_anchor(anchor: i32) -> Self {
        let mut years = [0; WINDOW_LEN];
        let first = anchor - ANCHOR_OFFSET as i32;
        for (offset, year) in years.iter_mut().enumerate() {
            *year = first + offset as i32;
        }
        Self(years)
    }

    pub fn anchor(&self) -> i32 {
        self.0[ANCHOR_OFFSET]
    }

    pub fn years(&self) -> &[i32] {
        &self.0
    }

    pub fn contains(&self, year: i64) -> bool {
        self.0.iter().any(|&y| i64::from(y) == year)
    }

    /// The first two years, used as block marker values.
    pub fn leading_pair(&self) -> (i32, i32) {
        (self.0[0], self.0[1])
    }
}

/// Result of a header search: the chosen row plus how full it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderGuess {
    pub row: usize,
    /// Non-empty cells in the chosen row.
    pub filled: usize,
    /// `filled / width`, between 0.0 and 1.0.
    pub confidence: f64,
}

/// The fixed set of sheets a business case workbook may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SheetKind {
    #[serde(rename = "Business Case")]
    BusinessCase,
    #[serde(rename = "1. Kosten")]
    Kosten,
    #[serde(rename = "2. Inv.& Afschrijvingen")]
    Investments,
    #[serde(rename = "3. Centrale Middelen")]
    CentralResources,
    #[serde(rename = "4. Opbrengsten")]
    Revenue,
    #[serde(rename = "4.b Directe inkoop Marge")]
    PurchaseMargin,
    #[serde(rename = "Opbrengsten per instelling")]
    RevenuePerInstitution,
    #[serde(rename = "Budget SAM")]
    BudgetSam,
    #[serde(rename = "Budget GL")]
    BudgetGl,
}

impl SheetKind {
    pub const ALL: [SheetKind; 9] = [
        SheetKind::BusinessCase,
        SheetKind::Kosten,
        SheetKind::Investments,
        SheetKind::CentralResources,
        SheetKind::Revenue,
        SheetKind::PurchaseMargin,
        SheetKind::RevenuePerInstitution,
        SheetKind::BudgetSam,
        SheetKind::BudgetGl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::BusinessCase => "Business Case",
            SheetKind::Kosten => "1. Kosten",
            SheetKind::Investments => "2. Inv.& Afschrijvingen",
            SheetKind::CentralResources => "3. Centrale Middelen",
            SheetKind::Revenue => "4. Opbrengsten",
            SheetKind::PurchaseMargin => "4.b Directe inkoop Marge",
            SheetKind::RevenuePerInstitution => "Opbrengsten per instelling",
            SheetKind::BudgetSam => "Budget SAM",
            SheetKind::BudgetGl => "Budget GL",
        }
    }
}

impl std::fmt::Display for SheetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SheetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown sheet: {}", s)))
    }
}
