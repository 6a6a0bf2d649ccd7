use serde::Deserialize;
use std::fs;
use tinymd::convert;

#[derive(Debug, Deserialize)]
struct Example {
    markdown: String,
    html: String,
    example: u32,
    section: String,
}

fn load_examples() -> Vec<Example> {
    let data = fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/tests.json"))
        .expect("Failed to read tests.json");
    serde_json::from_str(&data).expect("Failed to parse tests.json")
}

#[test]
fn dialect_examples() {
    let examples = load_examples();
    assert!(!examples.is_empty());

    let mut failures = Vec::new();
    for example in &examples {
        let result = convert(&example.markdown);
        if result != example.html {
            eprintln!("\nExample {} failed ({})", example.example, example.section);
            eprintln!("  Input: {:?}", example.markdown);
            eprintln!("  Expected: {:?}", example.html);
            eprintln!("  Got: {:?}", result);
            failures.push(example.example);
        }
    }

    eprintln!(
        "\nDialect examples: {}/{} passed",
        examples.len() - failures.len(),
        examples.len()
    );
    assert!(failures.is_empty(), "failed examples: {:?}", failures);
}

#[test]
fn every_section_is_covered() {
    let examples = load_examples();
    for section in [
        "Text formatting",
        "Titles",
        "Links and images",
        "Lists",
        "Line breaks",
        "Code and quotes",
        "Horizontal rules",
        "Edge cases",
    ] {
        assert!(
            examples.iter().any(|e| e.section == section),
            "no examples for section {section}"
        );
    }
}
