use crate::declaration::{FunctionMetadata, normalize_doc};
use crate::llm::Message;

const PERSONA: &[&str] = &[
    "You are an autonomous agent and a Rhai expert.",
    "The user is a program that can only interact with you in predetermined ways.",
    "You can only respond with code; the user controls everything else.",
    "Follow the instructions of the user.",
];

const CODE_INSTRUCTION: &str = "Write the function implementation, including anything else that \
might be needed to define the function. Respond with a single ```rhai code block.";

/// Build the seed conversation for a declared function.
///
/// Produces the persona, the task, and, when helpers exist, a message listing
/// their declarations without bodies.
pub fn seed_conversation(
    target: &FunctionMetadata,
    sketch: &str,
    helpers: &[FunctionMetadata],
) -> Vec<Message> {
    let mut messages = vec![Message::system(PERSONA.join("\n")), task_message(target, sketch)];

    if !helpers.is_empty() {
        let mut text = vec![
            "You may use the following helper functions without defining them, \
             I will add their definitions later:"
                .to_string(),
        ];
        for helper in helpers {
            text.push(fenced(&declaration_block(helper, "...")));
        }
        messages.push(Message::user(text.join("\n")));
    }

    messages
}

/// The instruction appended before every request for a candidate
pub fn code_instruction() -> Message {
    Message::user(CODE_INSTRUCTION)
}

fn task_message(target: &FunctionMetadata, sketch: &str) -> Message {
    Message::user(format!(
        "Please help me implement the following function:\n{}\n\
         Only use Rhai's built-in functions and packages unless stated otherwise.\n\
         Types and default values in the header are informational: Rhai parameters are \
         untyped and defaults are filled in for you, so define it as `fn {}(...) {{ ... }}` \
         taking every parameter.",
        fenced(&declaration_block(target, sketch)),
        target.name
    ))
}

fn declaration_block(function: &FunctionMetadata, body: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    if !function.doc.is_empty() {
        lines.extend(
            function
                .doc
                .lines()
                .map(|line| format!("/// {}", line).trim_end().to_string()),
        );
    }
    lines.push(format!("fn {} {{", function.signature));
    lines.extend(
        normalize_doc(body)
            .lines()
            .map(|line| format!("    {}", line).trim_end().to_string()),
    );
    lines.push("}".to_string());
    lines.join("\n")
}

fn fenced(code: &str) -> String {
    format!("```rhai\n{}\n```", code)
}
