//! Every sentence the assistant sends. Error details never reach the user;
//! they are logged and one of these is sent instead.

pub const MENU: &str = "Choose an option:";
pub const INVALID_OPTION: &str = "Invalid option. Choose an option:\n1. Menu\n2. Report\n";

pub const ASK_ERR_ID: &str = "Please enter your ERR ID to proceed with the financial report.";
pub const ERR_ID_NOT_FOUND: &str = "ERR ID not found. Please try again.";

pub const ASK_VENDOR: &str = "Please provide the vendor name.";
pub const ASK_RECEIPT: &str = "Please upload an image of the receipt.";
pub const ASK_AMOUNT: &str = "Please enter the amount paid (e.g., 45.00).";
pub const INVALID_AMOUNT: &str =
    "That amount could not be read. Please enter a number such as 45.00.";
pub const ASK_NEXT: &str =
    "Do you want to add another expense or submit the report?\n1. Add another expense\n2. Submit report";
pub const CHOOSE_NEXT: &str = "Please choose an option:\n1. Add another expense\n2. Submit report";
pub const ASK_ANOTHER_DESCRIPTION: &str =
    "Please provide the description of the item or service purchased.";
pub const REPORT_SUBMITTED: &str = "Report submitted. Thank you!";

pub const FORM_SUBMITTED: &str = "Report V2 submitted successfully!";
pub const FORM_INVALID: &str = "The submitted form could not be read. Please check it and try again.";
pub const NO_FORM_PENDING: &str = "There is no open form to submit. Type \"report v2\" to get one.";

pub const ASK_SCAN_UPLOAD: &str = "Please upload the image of the form you'd like to scan.";
pub const SCAN_REPROMPT: &str = "Please upload the image file for scanning.";
pub const SCAN_REVIEW: &str =
    "Please review the scanned form, correct anything that was misread and submit it.";
pub const SCAN_SUBMITTED: &str = "Scanned report submitted successfully!";
pub const SCAN_FAILED: &str =
    "Sorry, we could not read that form. Please try again with a clearer photo.";

pub const UNAUTHORIZED: &str = "Unauthorized access. Please log in.";
pub const APOLOGY: &str = "Sorry, something went wrong on our side. Please try again.";

pub fn existing_report(err_id: &str) -> String {
    format!(
        "Your ERR ID {} exists. Please provide a description of the item (e.g., food) or service (e.g., transportation) that you purchased.",
        err_id
    )
}

pub fn new_report(err_id: &str) -> String {
    format!(
        "A new financial report has been created for ERR ID {}. Let's start filling out the report. Please provide a description of the item or service that you purchased.",
        err_id
    )
}

pub fn echo(text: &str) -> String {
    format!("Server received: {}", text)
}
