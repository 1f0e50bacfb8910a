use calamine::Data;
use super::types::HeaderGuess;
use super::utils::is_blank;

/// Picks the header row of a headerless grid.
pub trait HeaderStrategy {
    fn locate(&self, grid: &[Vec<Data>]) -> Option<HeaderGuess>;
}

/// The row with the most non-empty cells wins; the earliest row wins ties.
///
/// A data row that is denser than the real header will be chosen instead, so
/// callers that care should look at [`HeaderGuess::confidence`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxFilledRow;

impl HeaderStrategy for MaxFilledRow {
    fn locate(&self, grid: &[Vec<Data>]) -> Option<HeaderGuess> {
        let width = grid.iter().map(|row| row.len()).max().unwrap_or(0);
        if width == 0 {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        for (idx, row) in grid.iter().enumerate() {
            let filled = row.iter().filter(|cell| !is_blank(cell)).count();
            if best.map_or(true, |(_, most)| filled > most) {
                best = Some((idx, filled));
            }
        }

        best.map(|(row, filled)| HeaderGuess {
            row,
            filled,
            confidence: filled as f64 / width as f64,
        })
    }
}

pub fn locate_header(grid: &[Vec<Data>]) -> Option<HeaderGuess> {
    MaxFilledRow.locate(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn densest_row_is_header() {
        let grid = vec![
            vec![text("Kosten"), Data::Empty, Data::Empty],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![text("Functie"), text("FTE"), text("Bedrag")],
            vec![text("Engineer"), Data::Float(2.0), Data::Empty],
        ];
        let guess = locate_header(&grid).unwrap();
        assert_eq!(guess.row, 2);
        assert_eq!(guess.filled, 3);
        assert!((guess.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_pick_first_row() {
        let grid = vec![
            vec![Data::Empty, Data::Empty],
            vec![text("a"), Data::Empty],
            vec![Data::Empty, text("b")],
        ];
        assert_eq!(locate_header(&grid).unwrap().row, 1);
    }

    #[test]
    fn empty_grid_has_no_header() {
        assert!(locate_header(&[]).is_none());
        assert!(locate_header(&[Vec::new()]).is_none());
    }

    #[test]
    fn all_blank_rows_fall_back_to_first_with_zero_confidence() {
        let grid = vec![vec![Data::Empty; 3], vec![Data::Empty; 3]];
        let guess = locate_header(&grid).unwrap();
        assert_eq!(guess.row, 0);
        assert_eq!(guess.confidence, 0.0);
    }
}
