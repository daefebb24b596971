//! Text generation backends used by the language-model classifier.

pub mod openai;

pub use openai::OpenAiGenerator;
