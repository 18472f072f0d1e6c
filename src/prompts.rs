//! Prompt templates.
//!
//! Pure string formatting over caller-supplied arguments. Each prompt
//! renders to a single user message.

use serde::Serialize;
use serde_json::{Value, json};

use crate::tools::args::{optional_str, required_str, str_or};
use crate::{R2rError, Result, timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

const fn arg(name: &'static str, description: &'static str, required: bool) -> PromptArgument {
    PromptArgument {
        name,
        description,
        required,
    }
}

pub fn list() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "research_question_prompt",
            description: "Guide a research answer on a topic, as an overview or in depth.",
            arguments: vec![
                arg("topic", "Subject to research", true),
                arg("depth", "\"standard\" (default) or \"deep\"", false),
            ],
        },
        PromptDescriptor {
            name: "code_review_prompt",
            description: "Request a code review with an optional focus area.",
            arguments: vec![
                arg("code_snippet", "Code to review", true),
                arg("language", "Language of the snippet (default: python)", false),
                arg(
                    "focus",
                    "security, performance, readability or general (default)",
                    false,
                ),
            ],
        },
        PromptDescriptor {
            name: "data_analysis_prompt",
            description: "Request a structured analysis of a described dataset.",
            arguments: vec![arg("dataset_description", "What the dataset contains", true)],
        },
    ]
}

fn user_message(text: String) -> Value {
    json!({
        "role": "user",
        "content": {"type": "text", "text": text},
    })
}

fn research_question(args: &Value) -> Result<String> {
    let topic = required_str(args, "topic")?;
    let text = if str_or(args, "depth", "standard")? == "deep" {
        format!(
            "Conduct a comprehensive, in-depth research analysis on: {topic}\n\n\
             Please include:\n\
             1. **Background & Context**: Historical development and current state\n\
             2. **Key Concepts**: Core principles and terminology\n\
             3. **Current Research**: Latest findings and developments\n\
             4. **Challenges**: Open questions and limitations\n\
             5. **Future Directions**: Emerging trends and predictions\n\
             6. **Sources**: Key references and further reading\n\n\
             Provide detailed explanations with examples."
        )
    } else {
        format!(
            "Provide a clear, concise overview of: {topic}\n\n\
             Include:\n\
             1. **Definition**: What is it?\n\
             2. **Key Points**: Main concepts and ideas\n\
             3. **Applications**: How is it used?\n\
             4. **Importance**: Why does it matter?"
        )
    };
    Ok(text)
}

fn focus_instruction(focus: &str) -> &'static str {
    match focus {
        "security" => "Focus on security vulnerabilities and best practices.",
        "performance" => "Focus on performance optimization opportunities.",
        "readability" => "Focus on code clarity and maintainability.",
        _ => "Provide a comprehensive review covering all aspects.",
    }
}

fn code_review(args: &Value) -> Result<String> {
    let code = required_str(args, "code_snippet")?;
    let language = str_or(args, "language", "python")?;
    let focus = optional_str(args, "focus")?.unwrap_or_default();
    Ok(format!(
        "Review the following {language} code:\n\n\
         ```{language}\n{code}\n```\n\n\
         {}\n\n\
         Provide:\n\
         - Issues found (if any)\n\
         - Suggestions for improvement\n\
         - Best practices recommendations",
        focus_instruction(&focus)
    ))
}

fn data_analysis(args: &Value, request_id: Option<&str>) -> Result<String> {
    let description = required_str(args, "dataset_description")?;
    Ok(format!(
        "Analyze the following dataset:\n\n{description}\n\n\
         Please provide:\n\
         1. **Data Overview**: Key characteristics and structure\n\
         2. **Statistical Summary**: Main statistics and distributions\n\
         3. **Patterns & Insights**: Notable trends and correlations\n\
         4. **Recommendations**: Suggested analyses or visualizations\n\
         5. **Data Quality**: Potential issues or limitations\n\n\
         Request initiated at: {}\n\
         Request ID: {}",
        timestamp(),
        request_id.unwrap_or("unknown")
    ))
}

/// Render prompt `name`. The result has `description` and `messages`.
pub fn render(name: &str, args: &Value, request_id: Option<&str>) -> Result<Value> {
    let descriptor = list()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| R2rError::NotFound(format!("Unknown prompt: {name}")))?;
    let text = match name {
        "research_question_prompt" => research_question(args)?,
        "code_review_prompt" => code_review(args)?,
        "data_analysis_prompt" => data_analysis(args, request_id)?,
        _ => return Err(R2rError::NotFound(format!("Unknown prompt: {name}"))),
    };
    Ok(json!({
        "description": descriptor.description,
        "messages": [user_message(text)],
    }))
}
