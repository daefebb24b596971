use std::sync::Arc;

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::{FieldMap, ReportSink};
use crate::config::PersistenceConfig;
use crate::error::{ProtocolError, ProviderError};
use crate::report::model::{
    DigitizedForm, ExpenseLine, NarrativeAnswers, PaymentMethod, PendingExpense,
    ReportSubmission, NOT_FOUND,
};

/// Receipt column value when the user never uploaded one.
pub const NO_RECEIPT: &str = "No receipt uploaded";

const CHAT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The structured multi-entry form as submitted by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(default, deserialize_with = "lenient_string")]
    pub err_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, rename = "total-grant")]
    pub total_grant: Option<Value>,
    #[serde(default, rename = "total-other-sources")]
    pub total_other_sources: Option<Value>,
    #[serde(
        default,
        rename = "additional-excess-expenses",
        deserialize_with = "lenient_string"
    )]
    pub excess_expenses: Option<String>,
    #[serde(
        default,
        rename = "additional-surplus-use",
        deserialize_with = "lenient_string"
    )]
    pub surplus_use: Option<String>,
    #[serde(
        default,
        rename = "additional-budget-lessons",
        deserialize_with = "lenient_string"
    )]
    pub budget_lessons: Option<String>,
    #[serde(
        default,
        rename = "additional-training-needs",
        deserialize_with = "lenient_string"
    )]
    pub training_needs: Option<String>,
    #[serde(default)]
    pub expenses: Option<ExpensesPayload>,
    #[serde(default)]
    pub uploaded_urls: Vec<String>,
}

/// Expenses arrive either as an array or as a JSON-encoded string of one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpensesPayload {
    Rows(Vec<FormExpense>),
    Encoded(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormExpense {
    #[serde(default, deserialize_with = "lenient_string")]
    pub activity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, rename = "payment-date", deserialize_with = "lenient_string")]
    pub payment_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub seller: Option<String>,
    #[serde(
        default,
        rename = "payment-method",
        deserialize_with = "lenient_string"
    )]
    pub payment_method: Option<String>,
    #[serde(default, rename = "receipt-no", deserialize_with = "lenient_string")]
    pub receipt_no: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
}

/// Accepts strings, numbers and null for free-text form fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Parses a user-entered number. Anything unusable becomes 0.0 and negative
/// values are clamped to 0.0.
pub fn safe_float(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.max(0.0),
        _ => 0.0,
    }
}

fn safe_float_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0),
        Some(Value::String(s)) => safe_float(s),
        _ => 0.0,
    }
}

/// Strict amount parse for the chat flow: `None` means re-prompt.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty()
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First four characters of the ERR ID followed by six random digits.
pub fn generate_report_id(err_id: &str) -> String {
    let prefix: String = err_id.chars().take(4).collect();
    let mut rng = rand::thread_rng();
    let digits: String = (0..6)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{}{}", prefix, digits)
}

fn text_or_empty(value: Option<&String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Treats the scan placeholders as blank.
fn extracted(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(NOT_FOUND) || trimmed.eq_ignore_ascii_case("n/a") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// The form's ERR ID when it holds one, else the principal's.
fn reporting_err_id(principal_err_id: &str, form_err_id: &str) -> String {
    let form_err_id = extracted(form_err_id);
    if form_err_id.is_empty() {
        principal_err_id.to_string()
    } else {
        form_err_id
    }
}

impl FormExpense {
    /// Pre-filled forms carry `N/A` for unread fields; those count as blank.
    fn to_line(&self) -> ExpenseLine {
        let field = |value: &Option<String>| extracted(value.as_deref().unwrap_or(""));
        let payment_date = field(&self.payment_date);
        ExpenseLine {
            activity: field(&self.activity),
            description: field(&self.description),
            payment_date: (!payment_date.is_empty()).then_some(payment_date),
            seller: field(&self.seller),
            payment_method: PaymentMethod::parse(&field(&self.payment_method)),
            receipt_no: field(&self.receipt_no),
            amount: safe_float_value(self.amount.as_ref()),
        }
    }
}

/// Rows ready for the report sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecords {
    pub summary: FieldMap,
    pub expenses: Vec<FieldMap>,
}

/// Builds report submissions and writes them to the report sink.
#[derive(Clone)]
pub struct ReportAssembler {
    sink: Arc<dyn ReportSink>,
    summary_table: String,
    expenses_table: String,
}

impl ReportAssembler {
    pub fn new(sink: Arc<dyn ReportSink>, config: &PersistenceConfig) -> Self {
        Self {
            sink,
            summary_table: config.summary_table.clone(),
            expenses_table: config.expenses_table.clone(),
        }
    }

    /// Builds a submission from the structured form. A non-blank `err_id`
    /// in the form overrides the authenticated principal's.
    pub fn from_form(
        principal_err_id: &str,
        form: &FormSubmission,
    ) -> Result<ReportSubmission, ProtocolError> {
        let err_id = reporting_err_id(principal_err_id, form.err_id.as_deref().unwrap_or(""));

        let expenses = match &form.expenses {
            None => Vec::new(),
            Some(ExpensesPayload::Rows(rows)) => rows.clone(),
            Some(ExpensesPayload::Encoded(s)) if s.trim().is_empty() => Vec::new(),
            Some(ExpensesPayload::Encoded(s)) => {
                serde_json::from_str::<Vec<FormExpense>>(s).map_err(ProtocolError::InvalidExpenses)?
            }
        };

        let narrative = NarrativeAnswers {
            excess_expenses: text_or_empty(form.excess_expenses.as_ref()),
            surplus_use: text_or_empty(form.surplus_use.as_ref()),
            budget_lessons: text_or_empty(form.budget_lessons.as_ref()),
            training_needs: text_or_empty(form.training_needs.as_ref()),
        };

        Ok(ReportSubmission::new(
            generate_report_id(&err_id),
            err_id,
            extracted(form.date.as_deref().unwrap_or("")),
            expenses.iter().map(FormExpense::to_line).collect(),
            safe_float_value(form.total_grant.as_ref()),
            safe_float_value(form.total_other_sources.as_ref()),
            narrative,
            form.uploaded_urls.clone(),
        ))
    }

    pub fn from_lines(err_id: &str, date: &str, lines: Vec<ExpenseLine>) -> ReportSubmission {
        ReportSubmission::new(
            generate_report_id(err_id),
            err_id.to_string(),
            date.to_string(),
            lines,
            0.0,
            0.0,
            NarrativeAnswers::default(),
            Vec::new(),
        )
    }

    /// Converts a confirmed scan into a submission with a single line. A
    /// readable report identifier overrides the principal's ERR ID, as the
    /// form's `err_id` does in [`Self::from_form`].
    pub fn from_digitized(principal_err_id: &str, form: &DigitizedForm) -> ReportSubmission {
        let err_id = reporting_err_id(principal_err_id, &form.report_identifier);
        let payment_date = extracted(&form.payment_date);
        let line = ExpenseLine {
            activity: extracted(&form.activity),
            description: extracted(&form.description),
            payment_date: (!payment_date.is_empty()).then_some(payment_date),
            seller: extracted(&form.seller),
            payment_method: PaymentMethod::parse(&extracted(&form.payment_method)),
            receipt_no: extracted(&form.receipt_no),
            amount: safe_float(&extracted(&form.amount)),
        };
        Self::from_lines(&err_id, &extracted(&form.date), vec![line])
    }

    pub fn to_records(submission: &ReportSubmission) -> ReportRecords {
        let mut summary = FieldMap::new();
        summary.insert("err_id".into(), Value::from(submission.err_id.clone()));
        summary.insert(
            "err_report_id".into(),
            Value::from(submission.report_id.clone()),
        );
        summary.insert("report_date".into(), Value::from(submission.date.clone()));
        summary.insert(
            "total_expenses".into(),
            Value::from(submission.total_expenses()),
        );
        summary.insert(
            "total_grant".into(),
            Value::from(submission.total_grant_received),
        );
        summary.insert(
            "total_other_sources".into(),
            Value::from(submission.total_other_sources),
        );
        let narrative = &submission.narrative;
        summary.insert(
            "excess_expenses".into(),
            Value::from(narrative.excess_expenses.clone()),
        );
        summary.insert(
            "surplus_use".into(),
            Value::from(narrative.surplus_use.clone()),
        );
        summary.insert(
            "lessons".into(),
            Value::from(narrative.budget_lessons.clone()),
        );
        summary.insert(
            "training".into(),
            Value::from(narrative.training_needs.clone()),
        );
        // Stored as a JSON string, not an array column.
        summary.insert(
            "files".into(),
            Value::from(Value::from(submission.files.clone()).to_string()),
        );

        let expenses = submission
            .lines()
            .iter()
            .map(|line| {
                let mut row = FieldMap::new();
                row.insert(
                    "err_report_id".into(),
                    Value::from(submission.report_id.clone()),
                );
                row.insert("expense_activity".into(), Value::from(line.activity.clone()));
                row.insert(
                    "expense_description".into(),
                    Value::from(line.description.clone()),
                );
                row.insert(
                    "payment_date".into(),
                    line.payment_date.clone().map(Value::from).unwrap_or(Value::Null),
                );
                row.insert("seller".into(), Value::from(line.seller.clone()));
                row.insert(
                    "payment_method".into(),
                    Value::from(line.payment_method.map(|m| m.as_str()).unwrap_or("")),
                );
                row.insert("receipt_no".into(), Value::from(line.receipt_no.clone()));
                row.insert("expense_amount".into(), Value::from(line.amount));
                row
            })
            .collect();

        ReportRecords { summary, expenses }
    }

    /// The five-column row appended to an entity's expense record.
    pub fn chat_row(pending: &PendingExpense, timestamp: NaiveDateTime) -> Vec<String> {
        vec![
            pending.description.clone().unwrap_or_default(),
            timestamp.format(CHAT_TIMESTAMP_FORMAT).to_string(),
            pending.vendor.clone().unwrap_or_default(),
            pending
                .receipt
                .clone()
                .unwrap_or_else(|| NO_RECEIPT.to_string()),
            pending.amount.clone().unwrap_or_default(),
        ]
    }

    /// Writes the summary row, then one row per expense line.
    ///
    /// A failed summary insert aborts. Failed expense inserts are logged and
    /// reported together after the remaining lines have been attempted.
    pub async fn persist(&self, submission: &ReportSubmission) -> Result<(), ProviderError> {
        let records = Self::to_records(submission);

        self.sink
            .insert(&self.summary_table, records.summary)
            .await?;

        let total = records.expenses.len();
        let mut failed = 0usize;
        for row in records.expenses {
            if let Err(e) = self.sink.insert(&self.expenses_table, row).await {
                failed += 1;
                log::error!(
                    "Failed to insert expense for report {}: {}",
                    submission.report_id,
                    e
                );
            }
        }

        if failed > 0 {
            return Err(ProviderError::Persistence(format!(
                "{} of {} expense rows failed for report {}",
                failed, total, submission.report_id
            )));
        }

        log::info!(
            "Persisted report {} with {} expense lines",
            submission.report_id,
            total
        );
        Ok(())
    }
}
