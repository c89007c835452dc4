//! The `quizgrade init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("quizgrade.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("banks")?;
    write_if_missing(Path::new("banks/example.toml"), EXAMPLE_BANK)?;
    write_if_missing(Path::new("example-answers.toml"), EXAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Edit quizgrade.toml with your API keys");
    println!("  2. Run: quizgrade validate --bank banks/example.toml");
    println!("  3. Run: quizgrade quiz --bank banks/example.toml --answers example-answers.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizgrade configuration

default_provider = "gemini"
default_model = "gemini-2.5-flash"
temperature = 0.0
max_tokens = 1024
call_timeout_secs = 60
max_attempts = 2
retry_delay_ms = 500

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
module_id = "3b0c9a52-1f7e-4d1a-9c2b-7a5e0f4d8c11"
title = "Ownership basics"
context = """
Every value has a single owner. Assigning or passing a non-Copy value moves
ownership; the previous binding can no longer be used. References borrow a
value without taking ownership, and the borrow checker enforces that a value
has either one mutable reference or any number of shared references.
"""

[[questions]]
id = "a1d4e7f0-0001-4c3b-8a2d-5e6f7a8b9c01"
type = "MCQ"
difficulty = "easy"
text = "What happens to `a` after `let b = a;` when `a` is a `String`?"
options = ["It is moved", "It is copied", "It is cloned", "It is dropped"]
correct_answer = "It is moved"
tags = ["ownership", "move"]

[[questions]]
id = "a1d4e7f0-0002-4c3b-8a2d-5e6f7a8b9c02"
type = "MCQ"
text = "How many mutable references to a value may exist at once?"
options = ["One", "Two", "Any number"]
correct_answer = "One"
tags = ["borrowing"]

[[questions]]
id = "a1d4e7f0-0003-4c3b-8a2d-5e6f7a8b9c03"
type = "DOUBLE_MCQ"
difficulty = "medium"
text = "Which types implement Copy?"
options = ["i32", "bool", "String", "Vec<u8>"]
correct_answer = ["i32", "bool"]
tags = ["copy"]

[[questions]]
id = "a1d4e7f0-0004-4c3b-8a2d-5e6f7a8b9c04"
type = "SUBJECTIVE"
difficulty = "hard"
text = "Explain why Rust forbids a mutable and a shared reference to the same value at the same time."
tags = ["borrowing"]
weight = 2.0

[questions.rubric]
criteria = [
    "mentions data races or aliasing",
    "explains that readers could observe a change mid-use",
    "connects the rule to compile-time checking",
]
"#;

const EXAMPLE_ANSWERS: &str = r#"[[answers]]
question_id = "a1d4e7f0-0001-4c3b-8a2d-5e6f7a8b9c01"
answer = "It is moved"
confidence = 9.0

[[answers]]
question_id = "a1d4e7f0-0002-4c3b-8a2d-5e6f7a8b9c02"
answer = "One"
confidence = 7.0

[[answers]]
question_id = "a1d4e7f0-0003-4c3b-8a2d-5e6f7a8b9c03"
answer = '["i32", "String"]'
confidence = 5.0

[[answers]]
question_id = "a1d4e7f0-0004-4c3b-8a2d-5e6f7a8b9c04"
answer = "A shared reference assumes the value will not change while it is held. Allowing a mutable one at the same time would let a reader see a half-finished update, so the compiler rejects it."
confidence = 6.0
"#;
