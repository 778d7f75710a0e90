// Resume review prompt templates.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const REVIEW_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Shape the model must return. Every category carries a 0-100 score and tips.
pub const FEEDBACK_FORMAT: &str = r#"{
  "overallScore": number,
  "ATS": { "score": number, "tips": [{ "type": "good" | "improve", "tip": "string" }] },
  "toneAndStyle": { "score": number, "tips": [{ "type": "good" | "improve", "tip": "string", "explanation": "string" }] },
  "content": { "score": number, "tips": [{ "type": "good" | "improve", "tip": "string", "explanation": "string" }] },
  "structure": { "score": number, "tips": [{ "type": "good" | "improve", "tip": "string", "explanation": "string" }] },
  "skills": { "score": number, "tips": [{ "type": "good" | "improve", "tip": "string", "explanation": "string" }] }
}"#;

/// Builds the analysis instructions for one job application.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    format!(
        "You are an expert in ATS (Applicant Tracking System) and resume analysis.\n\
         Analyze and rate this resume and suggest how to improve it.\n\
         The rating can be low if the resume is bad. Be thorough and detailed; \
         do not hesitate to point out mistakes or areas for improvement.\n\
         If provided, take the job description into consideration.\n\
         The job title is: {job_title}\n\
         The job description is: {job_description}\n\
         Provide the feedback using the following format:\n\
         {FEEDBACK_FORMAT}\n\
         Return the analysis as a JSON object, without any other text and without backticks."
    )
}

/// Wraps the extracted resume text with the instructions.
pub fn review_prompt(resume_text: &str, instructions: &str) -> String {
    format!("{instructions}\n\nRESUME TEXT:\n{}", resume_text.trim())
}
