use serde::{Deserialize, Serialize};

/// Placeholder for a field the scan flow could not extract.
pub const NOT_FOUND: &str = "not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    /// Lenient parse of what users and OCR produce ("Cash", "bank app", "Bank Transfer").
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if normalized == "cash" || normalized.starts_with("cash ") {
            return Some(PaymentMethod::Cash);
        }
        if normalized.contains("bank") || normalized.contains("transfer") {
            return Some(PaymentMethod::BankTransfer);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "Bank Transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpenseLine {
    pub activity: String,
    pub description: String,
    pub payment_date: Option<String>,
    pub seller: String,
    pub payment_method: Option<PaymentMethod>,
    pub receipt_no: String,
    pub amount: f64,
}

impl ExpenseLine {
    /// A line with neither an activity nor an amount carries no data.
    pub fn is_empty(&self) -> bool {
        self.activity.trim().is_empty() && self.amount == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NarrativeAnswers {
    pub excess_expenses: String,
    pub surplus_use: String,
    pub budget_lessons: String,
    pub training_needs: String,
}

/// A complete financial report, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSubmission {
    pub report_id: String,
    pub err_id: String,
    pub date: String,
    lines: Vec<ExpenseLine>,
    pub total_grant_received: f64,
    pub total_other_sources: f64,
    pub narrative: NarrativeAnswers,
    pub files: Vec<String>,
}

impl ReportSubmission {
    /// Builds a submission. Empty lines are dropped here and never stored.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        report_id: String,
        err_id: String,
        date: String,
        lines: Vec<ExpenseLine>,
        total_grant_received: f64,
        total_other_sources: f64,
        narrative: NarrativeAnswers,
        files: Vec<String>,
    ) -> Self {
        Self {
            report_id,
            err_id,
            date,
            lines: lines.into_iter().filter(|l| !l.is_empty()).collect(),
            total_grant_received,
            total_other_sources,
            narrative,
            files,
        }
    }

    pub fn lines(&self) -> &[ExpenseLine] {
        &self.lines
    }

    pub fn total_expenses(&self) -> f64 {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// Grant plus other sources minus expenses. Negative means overspent.
    pub fn remainder(&self) -> f64 {
        self.total_grant_received + self.total_other_sources - self.total_expenses()
    }
}

/// Structured fields recovered from a scanned paper form.
///
/// Every field holds [`NOT_FOUND`] when extraction failed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitizedForm {
    pub date: String,
    pub report_identifier: String,
    pub activity: String,
    pub description: String,
    pub payment_date: String,
    pub seller: String,
    pub payment_method: String,
    pub receipt_no: String,
    pub amount: String,
    pub raw_text: String,
    pub narrative: String,
}

impl Default for DigitizedForm {
    fn default() -> Self {
        let nf = || NOT_FOUND.to_string();
        Self {
            date: nf(),
            report_identifier: nf(),
            activity: nf(),
            description: nf(),
            payment_date: nf(),
            seller: nf(),
            payment_method: nf(),
            receipt_no: nf(),
            amount: nf(),
            raw_text: String::new(),
            narrative: String::new(),
        }
    }
}

/// Expense being collected in the chat sub-loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingExpense {
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub receipt: Option<String>,
    pub amount: Option<String>,
}
