//! Turns raw OCR text into structured report fields.
//!
//! Two strategies implement [`FieldClassifier`]: positional table
//! reconstruction and a language-model prompt. Both are best-effort; the
//! user confirms the result in a pre-filled form before anything is stored.

pub mod fields;
pub mod llm;
pub mod table;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fields::{extract_fields, ExtractedFields};
pub use llm::{LanguageModelClassifier, GENERATION_FAILED};
pub use table::TableClassifier;

use crate::backend::TextGenerator;
use crate::config::{ClassifierStrategy, GenerationConfig};

/// Column labels of the paper form's activity table, in order.
pub const TABLE_COLUMNS: [&str; 7] = [
    "Activity",
    "Description of Expenses",
    "Payment Date",
    "Seller/Recipient Details",
    "Payment Method",
    "Receipt Number",
    "Expenses",
];

/// One reconstructed row of the activity table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    pub activity: String,
    pub description: String,
    pub payment_date: String,
    pub seller: String,
    pub payment_method: String,
    pub receipt_no: String,
    pub expenses: String,
}

impl TableRow {
    pub fn from_cells(cells: [String; 7]) -> Self {
        let [activity, description, payment_date, seller, payment_method, receipt_no, expenses] =
            cells;
        Self {
            activity,
            description,
            payment_date,
            seller,
            payment_method,
            receipt_no,
            expenses,
        }
    }

    fn cells(&self) -> [&str; 7] {
        [
            &self.activity,
            &self.description,
            &self.payment_date,
            &self.seller,
            &self.payment_method,
            &self.receipt_no,
            &self.expenses,
        ]
    }

    /// Renders the row as `- Label: value` lines.
    pub fn to_labelled(&self) -> String {
        TABLE_COLUMNS
            .iter()
            .zip(self.cells())
            .map(|(label, value)| format!("- {}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Output of a classifier: rows it could reconstruct plus narrative text
/// shown to the user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub rows: Vec<TableRow>,
    pub text: String,
}

#[async_trait]
pub trait FieldClassifier: Send + Sync {
    async fn classify(&self, raw_text: &str) -> Classification;
}

/// Picks the configured strategy. The language-model strategy needs a
/// generator; without one the table strategy is used.
pub fn classifier_for(
    strategy: ClassifierStrategy,
    generator: Option<Arc<dyn TextGenerator>>,
    config: &GenerationConfig,
) -> Arc<dyn FieldClassifier> {
    match (strategy, generator) {
        (ClassifierStrategy::LanguageModel, Some(generator)) => Arc::new(
            LanguageModelClassifier::new(generator, config.max_tokens, config.temperature),
        ),
        (ClassifierStrategy::LanguageModel, None) => {
            log::warn!("Language-model classifier requested but no generator is configured, using table strategy");
            Arc::new(TableClassifier::new())
        }
        (ClassifierStrategy::Table, _) => Arc::new(TableClassifier::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_labelled() {
        let row = TableRow {
            activity: "Food".to_string(),
            expenses: "300".to_string(),
            ..Default::default()
        };
        let text = row.to_labelled();
        assert!(text.starts_with("- Activity: Food\n"));
        assert!(text.ends_with("- Expenses: 300"));
        assert_eq!(text.lines().count(), 7);
    }

    #[tokio::test]
    async fn test_classifier_for_falls_back_to_table() {
        let classifier = classifier_for(
            ClassifierStrategy::LanguageModel,
            None,
            &GenerationConfig::default(),
        );
        let result = classifier.classify("no table here").await;
        assert!(result.rows.is_empty());
    }
}
