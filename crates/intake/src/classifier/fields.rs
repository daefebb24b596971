//! Label-based extraction over classifier output.
//!
//! Each field is matched on its own line (`Activity: …`, `- Payment Date: …`,
//! `**Date:** …`), independently of the others and in any order.

use std::sync::LazyLock;

use regex::Regex;

use crate::classifier::TableRow;
use crate::report::{DigitizedForm, NOT_FOUND};

fn label_pattern(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:[-*•][ \t]*)?(?:\d+\.[ \t]*)?(?:\*\*)?(?:{})(?:\*\*)?[ \t]*:[ \t]*(?:\*\*)?[ \t]*(.*?)[ \t\r]*$",
        label
    ))
    .unwrap()
}

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| label_pattern("Date"));
static RE_ERR: LazyLock<Regex> =
    LazyLock::new(|| label_pattern(r"ERR(?:[ \t]+(?:Number|No\.?|ID))?"));
static RE_ACTIVITY: LazyLock<Regex> = LazyLock::new(|| label_pattern("Activity"));
static RE_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| label_pattern(r"Description(?:[ \t]+of[ \t]+Expenses)?"));
static RE_PAYMENT_DATE: LazyLock<Regex> = LazyLock::new(|| label_pattern(r"Payment[ \t]+Date"));
static RE_SELLER: LazyLock<Regex> =
    LazyLock::new(|| label_pattern(r"Seller(?:/Recipient)?(?:[ \t]+Details)?"));
static RE_PAYMENT_METHOD: LazyLock<Regex> =
    LazyLock::new(|| label_pattern(r"Payment[ \t]+Method(?:[ \t]*\(Cash/Bank[ \t]+App\))?"));
static RE_RECEIPT: LazyLock<Regex> =
    LazyLock::new(|| label_pattern(r"Receipt[ \t]+(?:Number|No\.?)"));
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| label_pattern("Expenses|Amount"));

/// First non-empty value for a label anywhere in `text`.
fn first_value(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches("**").trim().to_string())
        .find(|v| !v.is_empty())
}

/// Fields found in the text; `None` where a label was missing or empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedFields {
    pub date: Option<String>,
    pub report_identifier: Option<String>,
    pub activity: Option<String>,
    pub description: Option<String>,
    pub payment_date: Option<String>,
    pub seller: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_no: Option<String>,
    pub amount: Option<String>,
}

pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        date: first_value(&RE_DATE, text),
        report_identifier: first_value(&RE_ERR, text),
        activity: first_value(&RE_ACTIVITY, text),
        description: first_value(&*RE_DESCRIPTION, text),
        payment_date: first_value(&*RE_PAYMENT_DATE, text),
        seller: first_value(&*RE_SELLER, text),
        payment_method: first_value(&*RE_PAYMENT_METHOD, text),
        receipt_no: first_value(&*RE_RECEIPT, text),
        amount: first_value(&*RE_AMOUNT, text),
    }
}

impl ExtractedFields {
    pub fn to_digitized(&self, raw_text: &str, narrative: &str) -> DigitizedForm {
        let or_nf = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_FOUND.to_string());
        DigitizedForm {
            date: or_nf(&self.date),
            report_identifier: or_nf(&self.report_identifier),
            activity: or_nf(&self.activity),
            description: or_nf(&self.description),
            payment_date: or_nf(&self.payment_date),
            seller: or_nf(&self.seller),
            payment_method: or_nf(&self.payment_method),
            receipt_no: or_nf(&self.receipt_no),
            amount: or_nf(&self.amount),
            raw_text: raw_text.to_string(),
            narrative: narrative.to_string(),
        }
    }

    /// Fills fields the text lacked from the first reconstructed table row.
    pub fn merge_row(&mut self, row: &TableRow) {
        let fill = |slot: &mut Option<String>, value: &str| {
            if slot.is_none() && !value.trim().is_empty() {
                *slot = Some(value.trim().to_string());
            }
        };
        fill(&mut self.activity, &row.activity);
        fill(&mut self.description, &row.description);
        fill(&mut self.payment_date, &row.payment_date);
        fill(&mut self.seller, &row.seller);
        fill(&mut self.payment_method, &row.payment_method);
        fill(&mut self.receipt_no, &row.receipt_no);
        fill(&mut self.amount, &row.expenses);
    }
}

/// Groups labelled lines into table rows. Each `Activity:` line opens a row.
pub fn extract_rows(text: &str) -> Vec<TableRow> {
    let mut rows = Vec::new();
    let mut current: Option<TableRow> = None;

    for line in text.lines() {
        if let Some(activity) = first_value(&RE_ACTIVITY, line) {
            rows.extend(current.take());
            current = Some(TableRow {
                activity,
                ..Default::default()
            });
            continue;
        }
        let Some(row) = current.as_mut() else {
            continue;
        };
        let slots: [(&Regex, &mut String); 6] = [
            (&*RE_DESCRIPTION, &mut row.description),
            (&*RE_PAYMENT_DATE, &mut row.payment_date),
            (&*RE_SELLER, &mut row.seller),
            (&*RE_PAYMENT_METHOD, &mut row.payment_method),
            (&*RE_RECEIPT, &mut row.receipt_no),
            (&*RE_AMOUNT, &mut row.expenses),
        ];
        for (re, slot) in slots {
            if let Some(value) = first_value(re, line) {
                *slot = value;
                break;
            }
        }
    }
    rows.extend(current);
    rows
}
