use async_trait::async_trait;

use crate::classifier::{Classification, FieldClassifier, TableRow};

const HEADER_MARKER: &str = "Activity";
const CELLS_PER_ROW: usize = 7;

/// Rebuilds activity-table rows from OCR line order.
///
/// After the first line mentioning `Activity`, every non-blank line with at
/// least one digit is taken as a cell and every seven cells make a row. This
/// depends on the OCR engine emitting cells in reading order; cells without
/// digits are skipped, so rows shift when a cell is purely textual. Trailing
/// partial rows are dropped.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier;

impl TableClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn reconstruct_rows(&self, raw_text: &str) -> Vec<TableRow> {
        let mut lines = raw_text.lines();
        if !lines.by_ref().any(|line| line.contains(HEADER_MARKER)) {
            return Vec::new();
        }

        let cells: Vec<String> = lines
            .map(str::trim)
            .filter(|line| !line.is_empty() && line.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect();

        cells
            .chunks_exact(CELLS_PER_ROW)
            .map(|chunk| {
                let mut iter = chunk.iter().cloned();
                TableRow::from_cells(std::array::from_fn(|_| iter.next().unwrap_or_default()))
            })
            .collect()
    }
}

#[async_trait]
impl FieldClassifier for TableClassifier {
    async fn classify(&self, raw_text: &str) -> Classification {
        let rows = self.reconstruct_rows(raw_text);
        log::debug!("Table strategy reconstructed {} rows", rows.len());
        let text = rows
            .iter()
            .map(TableRow::to_labelled)
            .collect::<Vec<_>>()
            .join("\n\n");
        Classification { rows, text }
    }
}
