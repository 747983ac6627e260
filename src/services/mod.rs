pub mod input;
pub mod jobs;
pub mod llm;
#[cfg(test)]
pub mod mock;
pub mod output;
pub mod prompts;
pub mod retry;
pub mod schema;
pub mod stages;
pub mod transcriber;
pub mod workflow;
