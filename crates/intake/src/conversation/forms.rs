//! Structured payloads the client renders as forms.
//!
//! Field names match what [`crate::report::FormSubmission`] reads back, so a
//! rendered form submits without any renaming on the client.

use serde::{Deserialize, Serialize};

use crate::report::{DigitizedForm, NOT_FOUND};

/// Placeholder for a scanned field that could not be read.
pub const UNREAD: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Date,
    Number,
    Select,
    TextArea,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FormField {
    fn new(name: impl Into<String>, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.to_string(),
            kind,
            options: Vec::new(),
        }
    }

    fn select(name: impl Into<String>, label: &str, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Self::new(name, label, FieldKind::Select)
        }
    }
}

/// One numbered expense block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryBlock {
    pub title: String,
    pub fields: Vec<FormField>,
}

impl EntryBlock {
    pub fn numbered(index: usize) -> Self {
        Self {
            title: format!("Expense Entry {}", index),
            fields: vec![
                FormField::new(format!("activity-{index}"), "Activity:", FieldKind::Text),
                FormField::new(
                    format!("description-{index}"),
                    "Description of Expenses:",
                    FieldKind::Text,
                ),
                FormField::new(format!("payment-date-{index}"), "Payment Date:", FieldKind::Date),
                FormField::new(
                    format!("seller-{index}"),
                    "Seller / Recipient Details:",
                    FieldKind::Text,
                ),
                FormField::select(
                    format!("payment-method-{index}"),
                    "Payment Method:",
                    &["cash", "bank app"],
                ),
                FormField::new(format!("receipt-no-{index}"), "Receipt No.:", FieldKind::Text),
                FormField::new(format!("expenses-{index}"), "Expenses:", FieldKind::Number),
            ],
        }
    }
}

/// The multi-entry financial report form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiEntryForm {
    pub header: Vec<FormField>,
    pub entries: Vec<EntryBlock>,
    pub attachments: FormField,
    pub totals: Vec<FormField>,
    pub questions: Vec<FormField>,
}

impl MultiEntryForm {
    pub fn new(entries: usize) -> Self {
        Self {
            header: vec![
                FormField::new("err_id", "ERR ID:", FieldKind::Text),
                FormField::new("date", "Date:", FieldKind::Date),
            ],
            entries: (1..=entries).map(EntryBlock::numbered).collect(),
            attachments: FormField::new("file", "Upload Receipts/Files:", FieldKind::File),
            totals: vec![
                FormField::new("total-grant", "Total Grant Received:", FieldKind::Number),
                FormField::new(
                    "total-other-sources",
                    "Total Amount from Other Sources:",
                    FieldKind::Number,
                ),
            ],
            questions: vec![
                FormField::new(
                    "additional-excess-expenses",
                    "How did you cover excess expenses?",
                    FieldKind::TextArea,
                ),
                FormField::new(
                    "additional-surplus-use",
                    "How would you spend the surplus?",
                    FieldKind::TextArea,
                ),
                FormField::new(
                    "additional-budget-lessons",
                    "Lessons learned in budget planning?",
                    FieldKind::TextArea,
                ),
                FormField::new(
                    "additional-training-needs",
                    "Additional training needs?",
                    FieldKind::TextArea,
                ),
            ],
        }
    }
}

/// Keys follow [`crate::report::FormExpense`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefilledExpense {
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "payment-date")]
    pub payment_date: String,
    #[serde(default)]
    pub seller: String,
    #[serde(default, rename = "payment-method")]
    pub payment_method: String,
    #[serde(default, rename = "receipt-no")]
    pub receipt_no: String,
    #[serde(default)]
    pub amount: String,
}

/// A scanned form shown back to the user for correction. Submitted back,
/// possibly edited, to confirm the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefilledForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub err_id: String,
    #[serde(default)]
    pub expenses: Vec<PrefilledExpense>,
}

fn shown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(NOT_FOUND) {
        UNREAD.to_string()
    } else {
        value.to_string()
    }
}

impl From<&DigitizedForm> for PrefilledForm {
    fn from(form: &DigitizedForm) -> Self {
        Self {
            date: shown(&form.date),
            err_id: shown(&form.report_identifier),
            expenses: vec![PrefilledExpense {
                activity: shown(&form.activity),
                description: shown(&form.description),
                payment_date: shown(&form.payment_date),
                seller: shown(&form.seller),
                payment_method: shown(&form.payment_method),
                receipt_no: shown(&form.receipt_no),
                amount: shown(&form.amount),
            }],
        }
    }
}

impl PrefilledForm {
    /// The scanned form with this form's values written over it. Only the
    /// first expense is read, matching what a scan produces.
    pub fn apply_to(&self, scanned: &DigitizedForm) -> DigitizedForm {
        let mut form = DigitizedForm {
            date: self.date.clone(),
            report_identifier: self.err_id.clone(),
            ..scanned.clone()
        };
        if let Some(expense) = self.expenses.first() {
            form.activity = expense.activity.clone();
            form.description = expense.description.clone();
            form.payment_date = expense.payment_date.clone();
            form.seller = expense.seller.clone();
            form.payment_method = expense.payment_method.clone();
            form.receipt_no = expense.receipt_no.clone();
            form.amount = expense.amount.clone();
        }
        form
    }
}
