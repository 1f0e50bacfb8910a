use calamine::Data;
use regex::{Regex, RegexBuilder};
use super::types::Table;
use super::utils::{cell_text, is_blank};
use crate::error::AppError;

/// Tags rows with every keyword their classification column contains.
///
/// Matching is a case-insensitive substring test. Tags are not exclusive: one
/// row can land in several subsets.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    column: usize,
    keywords: Vec<(String, Regex)>,
}

impl KeywordClassifier {
    /// Classifies on the second column (B).
    pub fn new<I, S>(keywords: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| {
                let keyword = keyword.as_ref();
                RegexBuilder::new(&regex::escape(keyword))
                    .case_insensitive(true)
                    .build()
                    .map(|re| (keyword.to_string(), re))
                    .map_err(|e| AppError::InvalidInput(format!("Bad keyword {}: {}", keyword, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { column: 1, keywords })
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    /// Keywords matched by one row, in keyword order.
    pub fn tags(&self, row: &[Data]) -> Vec<&str> {
        let Some(cell) = row.get(self.column).filter(|cell| !is_blank(cell)) else {
            return Vec::new();
        };
        let text = cell_text(cell);
        self.keywords
            .iter()
            .filter(|(_, re)| re.is_match(&text))
            .map(|(keyword, _)| keyword.as_str())
            .collect()
    }

    /// Subsets per keyword. Keywords without matches are left out.
    pub fn split(&self, table: &Table) -> CategorySplit {
        if self.column >= table.width() {
            return CategorySplit::default();
        }

        let mut subsets: Vec<(String, Vec<Vec<Data>>)> = self
            .keywords
            .iter()
            .map(|(keyword, _)| (keyword.clone(), Vec::new()))
            .collect();

        for row in &table.rows {
            for tag in self.tags(row) {
                if let Some((_, rows)) = subsets.iter_mut().find(|(keyword, _)| keyword == tag) {
                    rows.push(row.clone());
                }
            }
        }

        CategorySplit(
            subsets
                .into_iter()
                .filter(|(_, rows)| !rows.is_empty())
                .map(|(keyword, rows)| (keyword, Table::new(table.columns.clone(), rows)))
                .collect(),
        )
    }
}

/// Keyword to matching rows, in keyword order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySplit(Vec<(String, Table)>);

impl CategorySplit {
    pub fn get(&self, keyword: &str) -> Option<&Table> {
        self.0.iter().find(|(k, _)| k == keyword).map(|(_, table)| table)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.0.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
