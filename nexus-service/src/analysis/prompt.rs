use serde_json::{Value, json};

pub const SYSTEM_INSTRUCTION: &str = r#"You are a scientific research analyst feeding a knowledge visualization dashboard.
Convert dense academic papers into structured, high-clarity knowledge objects.
Extract the core narrative, quantify the paper's impact, and simplify complex mechanisms without losing accuracy.
Write for two audiences at once: use analogies so non-experts can follow, and keep the technical depth experts expect."#;

/// User turn sent with the (already truncated) document text
pub fn build_prompt(document_text: &str) -> String {
    format!(
        "Analyze the following research paper text and return a single valid JSON object.\n\n\
         Text content (truncated if too long):\n{document_text}"
    )
}

/// Output schema in the OpenAPI subset accepted by structured-output APIs.
///
/// The item counts in the descriptions are suggestions to the model, nothing
/// checks them.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "authors": { "type": "ARRAY", "items": { "type": "STRING" } },
            "publication_date": { "type": "STRING" },
            "executive_summary": {
                "type": "STRING",
                "description": "A compelling 3-sentence summary of the breakthrough."
            },
            "metrics": {
                "type": "ARRAY",
                "description": "5 key quantitative assessments of the paper on a scale of 0-100.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING", "description": "e.g. Innovation, Complexity, Practicality" },
                        "value": { "type": "NUMBER" },
                        "description": { "type": "STRING" }
                    }
                }
            },
            "concepts": {
                "type": "ARRAY",
                "description": "The 6 most important concepts or entities in the paper. Ids must be unique.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "name": { "type": "STRING" },
                        "category": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "importance": { "type": "NUMBER", "description": "0-100" }
                    }
                }
            },
            "sections": {
                "type": "ARRAY",
                "description": "Deep dive into 4 main sections (e.g. Methodology, Results).",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "simplified_explanation": {
                            "type": "STRING",
                            "description": "A detailed plain-language version with analogies."
                        },
                        "technical_detail": {
                            "type": "STRING",
                            "description": "Rigorous academic detail, naming specific algorithms or proofs where relevant."
                        },
                        "key_takeaway": { "type": "STRING" }
                    }
                }
            },
            "future_implications": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    })
}

/// Prompt variant for providers without native schema support
pub fn build_prompt_with_schema(document_text: &str) -> String {
    format!(
        "{}\n\nRespond with JSON only, matching this schema:\n{:#}",
        build_prompt(document_text),
        response_schema()
    )
}
