use tracing::debug;

use crate::error::Result;
use crate::model::TextModel;
use crate::summary::summarize;
use crate::types::IncidentRecord;

pub const NO_DATA_ANSWER: &str = "Sorry, I couldn't find any data matching that question.";

/// Default generation budget for an answer
pub const DEFAULT_MAX_NEW_TOKENS: usize = 150;

/// Build the instruction prompt around a summary of the selected records
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a friendly and helpful assistant analyzing recent crime data from Cincinnati.
Use the provided incident summaries below to answer the user's question.
If the question is asking for a number, respond with the count clearly.
If the question is more open-ended (like \"why\"), provide a thoughtful,
conversational explanation based on the data.
Be polite and informative, and aim to help the user understand the data better.
Here are some relevant data points:
{}
Now answer this question based on the above:
{}",
        context, question
    )
    .trim()
    .to_string()
}

/// Answer `question` from the already-filtered `records`. The model is not
/// called when there is nothing to talk about.
pub fn answer<M: TextModel + ?Sized>(
    question: &str,
    records: &[IncidentRecord],
    model: &M,
    max_new_tokens: usize,
) -> Result<String> {
    if records.is_empty() {
        return Ok(NO_DATA_ANSWER.to_string());
    }

    let context = summarize(question, records);
    let prompt = build_prompt(question, &context);
    debug!(rows = records.len(), prompt_chars = prompt.len(), "Calling text model");

    let generated = model.generate(&prompt, max_new_tokens)?;
    Ok(generated.trim().to_string())
}
