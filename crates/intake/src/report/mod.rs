pub mod assembler;
pub mod model;

pub use assembler::{
    generate_report_id, parse_amount, safe_float, ExpensesPayload, FormExpense, FormSubmission,
    ReportAssembler, ReportRecords, NO_RECEIPT,
};
pub use model::{
    DigitizedForm, ExpenseLine, NarrativeAnswers, PaymentMethod, PendingExpense,
    ReportSubmission, NOT_FOUND,
};
