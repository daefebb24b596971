use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::TextGenerator;
use crate::classifier::fields::extract_rows;
use crate::classifier::{Classification, FieldClassifier};
use crate::sanitize::{preview_text, sanitize_for_prompt};

/// Answer text when the generator fails.
pub const GENERATION_FAILED: &str = "An error occurred while processing the data.";

const PROMPT_TEMPLATE: &str = "\
I have extracted the following text from a financial report form. The text contains multiple sections including a date, ERR number, an activity table, a financial summary, and responses to additional questions.

Here is the text:
{text}

Please extract the following information and structure it accordingly:

1. Date: Identify the date from the text.
2. ERR Number: Extract the ERR number.
3. Activity Table: Identify each row in the activity table and organize the data into the following fields:
   - Activity
   - Description of Expenses
   - Payment Date
   - Seller/Recipient Details
   - Payment Method (Cash/Bank App)
   - Receipt Number
   - Expenses
4. Financial Summary: Extract the following fields:
   - Total Expenses
   - Total Grant Received
   - Total Amount from Other Sources
   - Remainder
5. Additional Questions: Extract responses to the following questions:
   - How did you cover excess expenses?
   - How would you spend the surplus if expenses were less than the grant received?
   - What lessons did you learn about budget planning?
   - Were there any additional training needs or opportunities?
";

pub fn build_prompt(raw_text: &str) -> String {
    PROMPT_TEMPLATE.replace("{text}", &sanitize_for_prompt(raw_text))
}

/// Asks a text generator to structure the OCR text.
///
/// Never fails: generator errors are logged and replaced by
/// [`GENERATION_FAILED`].
pub struct LanguageModelClassifier {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
    temperature: f32,
}

impl LanguageModelClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            generator,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl FieldClassifier for LanguageModelClassifier {
    async fn classify(&self, raw_text: &str) -> Classification {
        let prompt = build_prompt(raw_text);

        match self
            .generator
            .complete(&prompt, self.max_tokens, self.temperature)
            .await
        {
            Ok(answer) => {
                log::debug!("Classifier answer: {}", preview_text(&answer));
                Classification {
                    rows: extract_rows(&answer),
                    text: answer,
                }
            }
            Err(e) => {
                log::error!("Text generation failed during classification: {}", e);
                Classification {
                    rows: Vec::new(),
                    text: GENERATION_FAILED.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        answer: Result<String, String>,
        seen: Mutex<Vec<(String, u32, f32)>>,
    }

    impl ScriptedGenerator {
        fn new(answer: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(
            &self,
            prompt: &str,
            max_tokens: u32,
            temperature: f32,
        ) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), max_tokens, temperature));
            self.answer.clone().map_err(ProviderError::Generation)
        }
    }

    #[test]
    fn test_prompt_collapses_newlines() {
        let prompt = build_prompt("Date: 01/03\nERR 12\n\nActivity");
        assert!(prompt.contains("Here is the text:\nDate: 01/03 ERR 12 Activity\n"));
        assert!(prompt.contains("Payment Method (Cash/Bank App)"));
    }

    #[tokio::test]
    async fn test_returns_answer_verbatim() {
        let answer = "1. Date: 2024-03-01\n- Activity: Food\n- Expenses: 300";
        let generator = ScriptedGenerator::new(Ok(answer));
        let classifier = LanguageModelClassifier::new(generator.clone(), 1000, 0.7);

        let result = classifier.classify("raw\ntext").await;
        assert_eq!(result.text, answer);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, 1000);
        assert!((seen[0].2 - 0.7).abs() < f32::EPSILON);
        assert!(seen[0].0.contains("raw text"));
    }

    #[tokio::test]
    async fn test_generator_error_yields_fixed_text() {
        let classifier =
            LanguageModelClassifier::new(ScriptedGenerator::new(Err("rate limited")), 1000, 0.7);
        let result = classifier.classify("raw").await;
        assert_eq!(result.text, GENERATION_FAILED);
        assert!(result.rows.is_empty());
    }
}
