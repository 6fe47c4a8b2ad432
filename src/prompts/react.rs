use crate::thinker::{Prompt, ToolDescription};

const RESPONSE_HEADER: &str = "You MUST respond with valid JSON in one of two formats:";
const TOOL_FORMAT: &str = "To use a tool:\n{\"thought\": \"your reasoning about what to do next\", \"action\": {\"tool\": \"tool_name\", \"input\": {\"query\": \"tool input\"}}}";
const ANSWER_FORMAT: &str = "To give the final answer:\n{\"thought\": \"I now know the final answer\", \"answer\": \"the complete final answer\"}";
const RULES_HEADER: &str = "Rules:";
const RULES: &[&str] = &[
    "Output JSON only. No markdown, no extra text, no extra keys.",
    "Thought should be brief (1–2 sentences).",
    "Use only the tools listed above. Never invent tools.",
    "Call exactly one tool per response.",
    "If a tool returns an error, analyze it and try a different input.",
    "The answer must be the actual complete content, not a summary of it.",
];
const NO_TOOLS: &str = "You have no tools. Answer from your own knowledge and the context given.";
const EXPECTED_OUTPUT_SUFFIX: &str =
    "You MUST return the actual complete content as the final answer, not a summary.";

/// System prompt: persona, tool catalogue, response format.
pub fn build_react_system_prompt(prompt: &Prompt) -> String {
    let persona = format!(
        "You are {role}. {backstory}\nYour personal goal is: {goal}",
        role = prompt.role,
        backstory = prompt.backstory,
        goal = prompt.goal
    );

    let tools_section = if prompt.available_tools.is_empty() {
        NO_TOOLS.to_string()
    } else {
        format!(
            "You have access to these tools:\n{}",
            tools_list(&prompt.available_tools)
        )
    };

    let rules = RULES
        .iter()
        .map(|rule| format!("- {}", rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{persona}\n\n{tools_section}\n\n{RESPONSE_HEADER}\n\n{TOOL_FORMAT}\n\n{ANSWER_FORMAT}\n\n{RULES_HEADER}\n{rules}\n"
    )
}

fn tools_list(tools: &[ToolDescription]) -> String {
    tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First user message: the task, its expected output, and prior results.
pub fn build_task_message(prompt: &Prompt) -> String {
    let mut message = format!(
        "Current Task: {task}\n\nThis is the expected criteria for your final answer: {expected}\n{EXPECTED_OUTPUT_SUFFIX}",
        task = prompt.task,
        expected = prompt.expected_output,
    );
    if let Some(context) = &prompt.context {
        message.push_str("\n\nThis is the context you're working with:\n");
        message.push_str(context);
    }
    message.push_str("\n\nBegin! This is VERY important to you, use the tools available and give your best Final Answer.");
    message
}
