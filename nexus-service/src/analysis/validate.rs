//! Conversion of the model's raw JSON reply into a [`StructuredAnalysis`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::{
    error::{AnalysisError, ValidationError},
    models::{ConceptNode, DeepDiveSection, QuantitativeMetric, StructuredAnalysis},
};

/// How much of the reply is checked before it is accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Missing fields, scores outside 0-100 and repeated concept ids are errors
    #[default]
    Strict,
    /// Missing fields become empty values and numbers pass through untouched
    Lenient,
}

impl std::str::FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown validation policy '{other}'")),
        }
    }
}

// Scalars stay untyped until the policy decides how to read them
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    title: Option<Value>,
    authors: Option<Vec<Value>>,
    publication_date: Option<Value>,
    executive_summary: Option<Value>,
    metrics: Option<Vec<RawMetric>>,
    concepts: Option<Vec<RawConcept>>,
    sections: Option<Vec<RawSection>>,
    future_implications: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetric {
    label: Option<Value>,
    value: Option<Value>,
    description: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConcept {
    id: Option<Value>,
    name: Option<Value>,
    category: Option<Value>,
    description: Option<Value>,
    importance: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    title: Option<Value>,
    simplified_explanation: Option<Value>,
    technical_detail: Option<Value>,
    key_takeaway: Option<Value>,
}

/// Pull the JSON body out of a Markdown code fence, wherever the fence
/// starts and whatever language tag it carries
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse and check a reply body
pub fn parse_analysis(
    raw: &str,
    policy: ValidationPolicy,
) -> Result<StructuredAnalysis, AnalysisError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let parsed: RawAnalysis = serde_json::from_str(body)?;
    let analysis = Fields { policy }.analysis(parsed)?;

    debug!(
        ?policy,
        metrics = analysis.metrics.len(),
        concepts = analysis.concepts.len(),
        sections = analysis.sections.len(),
        "Parsed analysis reply"
    );
    Ok(analysis)
}

struct Fields {
    policy: ValidationPolicy,
}

impl Fields {
    fn lenient(&self) -> bool {
        self.policy == ValidationPolicy::Lenient
    }

    fn required<T: Default>(&self, value: Option<T>, path: &str) -> Result<T, ValidationError> {
        match (value, self.policy) {
            (Some(value), _) => Ok(value),
            (None, ValidationPolicy::Lenient) => Ok(T::default()),
            (None, ValidationPolicy::Strict) => Err(ValidationError::MissingField(path.to_string())),
        }
    }

    /// A string field. Lenient mode accepts any scalar and keeps its JSON text.
    fn text(&self, value: Option<Value>, path: &str) -> Result<String, ValidationError> {
        match self.required(value.filter(|v| !v.is_null()), path)? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other if self.lenient() => Ok(other.to_string()),
            _ => Err(ValidationError::WrongType {
                field: path.to_string(),
                expected: "string",
            }),
        }
    }

    fn texts(&self, values: Option<Vec<Value>>, path: &str) -> Result<Vec<String>, ValidationError> {
        self.required(values, path)?
            .into_iter()
            .enumerate()
            .map(|(i, v)| self.text(Some(v), &format!("{path}[{i}]")))
            .collect()
    }

    /// A 0-100 score. Lenient mode reads numeric strings and passes any
    /// value through; a non-numeric value becomes 0.
    fn score(&self, value: Option<Value>, path: &str) -> Result<f64, ValidationError> {
        let number = match self.required(value.filter(|v| !v.is_null()), path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if self.lenient() => s.trim().parse::<f64>().ok(),
            Value::Null => Some(0.0),
            _ => None,
        };
        let value = match number {
            Some(value) => value,
            None if self.lenient() => {
                debug!(field = path, "Non-numeric score read as 0");
                0.0
            }
            None => {
                return Err(ValidationError::WrongType {
                    field: path.to_string(),
                    expected: "number",
                });
            }
        };

        if !self.lenient() && !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: path.to_string(),
                value,
            });
        }
        Ok(value)
    }

    fn analysis(&self, raw: RawAnalysis) -> Result<StructuredAnalysis, ValidationError> {
        let metrics = self
            .required(raw.metrics, "metrics")?
            .into_iter()
            .enumerate()
            .map(|(i, m)| self.metric(m, i))
            .collect::<Result<Vec<_>, _>>()?;

        let concepts = self
            .required(raw.concepts, "concepts")?
            .into_iter()
            .enumerate()
            .map(|(i, c)| self.concept(c, i))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.lenient() {
            let mut seen = HashSet::new();
            if let Some(dup) = concepts.iter().find(|c| !seen.insert(c.id.as_str())) {
                return Err(ValidationError::DuplicateConceptId(dup.id.clone()));
            }
        }

        let sections = self
            .required(raw.sections, "sections")?
            .into_iter()
            .enumerate()
            .map(|(i, s)| self.section(s, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StructuredAnalysis {
            title: self.text(raw.title, "title")?,
            authors: self.texts(raw.authors, "authors")?,
            publication_date: self.text(raw.publication_date, "publication_date")?,
            executive_summary: self.text(raw.executive_summary, "executive_summary")?,
            metrics,
            concepts,
            sections,
            future_implications: self.texts(raw.future_implications, "future_implications")?,
        })
    }

    fn metric(&self, raw: RawMetric, i: usize) -> Result<QuantitativeMetric, ValidationError> {
        Ok(QuantitativeMetric {
            label: self.text(raw.label, &format!("metrics[{i}].label"))?,
            value: self.score(raw.value, &format!("metrics[{i}].value"))?,
            description: self.text(raw.description, &format!("metrics[{i}].description"))?,
        })
    }

    fn concept(&self, raw: RawConcept, i: usize) -> Result<ConceptNode, ValidationError> {
        Ok(ConceptNode {
            id: self.text(raw.id, &format!("concepts[{i}].id"))?,
            name: self.text(raw.name, &format!("concepts[{i}].name"))?,
            category: self.text(raw.category, &format!("concepts[{i}].category"))?,
            description: self.text(raw.description, &format!("concepts[{i}].description"))?,
            importance: self.score(raw.importance, &format!("concepts[{i}].importance"))?,
        })
    }

    fn section(&self, raw: RawSection, i: usize) -> Result<DeepDiveSection, ValidationError> {
        Ok(DeepDiveSection {
            title: self.text(raw.title, &format!("sections[{i}].title"))?,
            simplified_explanation: self.text(
                raw.simplified_explanation,
                &format!("sections[{i}].simplified_explanation"),
            )?,
            technical_detail: self
                .text(raw.technical_detail, &format!("sections[{i}].technical_detail"))?,
            key_takeaway: self.text(raw.key_takeaway, &format!("sections[{i}].key_takeaway"))?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_reply() -> Value {
        json!({
            "title": "Attention Is All You Need",
            "authors": ["Ashish Vaswani", "Noam Shazeer"],
            "publication_date": "2017",
            "executive_summary": "Attention replaces recurrence.",
            "metrics": [
                { "label": "Innovation", "value": 95, "description": "New architecture" },
                { "label": "Complexity", "value": 70.5, "description": "Moderate" }
            ],
            "concepts": [
                { "id": "attn", "name": "Self-attention", "category": "Mechanism",
                  "description": "Tokens attend to each other", "importance": 100 },
                { "id": "pe", "name": "Positional encoding", "category": "Technique",
                  "description": "Sinusoids encode order", "importance": 60 }
            ],
            "sections": [
                { "title": "Model", "simplified_explanation": "Like a group chat",
                  "technical_detail": "Scaled dot-product attention", "key_takeaway": "Parallel" }
            ],
            "future_implications": ["Large language models"]
        })
    }

    fn without(field: &str) -> String {
        let mut reply = sample_reply();
        reply.as_object_mut().unwrap().remove(field);
        reply.to_string()
    }

    #[test]
    fn well_formed_reply_parses() {
        let analysis = parse_analysis(&sample_reply().to_string(), ValidationPolicy::Strict).unwrap();
        assert_eq!(analysis.title, "Attention Is All You Need");
        assert_eq!(analysis.metrics[1].value, 70.5);
        assert_eq!(analysis.concepts[0].id, "attn");
        assert_eq!(analysis.sections[0].key_takeaway, "Parallel");
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", sample_reply());
        assert!(parse_analysis(&fenced, ValidationPolicy::Strict).is_ok());
    }

    #[test]
    fn missing_concepts_is_empty_when_lenient() {
        let analysis = parse_analysis(&without("concepts"), ValidationPolicy::Lenient).unwrap();
        assert!(analysis.concepts.is_empty());
        assert_eq!(analysis.metrics.len(), 2);
    }

    #[test]
    fn missing_concepts_is_an_error_when_strict() {
        let err = parse_analysis(&without("concepts"), ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::MissingField(ref f)) if f == "concepts"
        ));
    }

    #[test]
    fn nested_missing_field_names_its_path() {
        let mut reply = sample_reply();
        reply["sections"][0].as_object_mut().unwrap().remove("technical_detail");
        let err = parse_analysis(&reply.to_string(), ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::MissingField(ref f))
                if f == "sections[0].technical_detail"
        ));
    }

    #[test]
    fn scores_outside_range_depend_on_policy() {
        let mut reply = sample_reply();
        reply["metrics"][0]["value"] = json!(140);
        let body = reply.to_string();

        let lenient = parse_analysis(&body, ValidationPolicy::Lenient).unwrap();
        assert_eq!(lenient.metrics[0].value, 140.0);

        let err = parse_analysis(&body, ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::OutOfRange { ref field, value })
                if field == "metrics[0].value" && value == 140.0
        ));
    }

    #[test]
    fn duplicate_concept_ids_are_rejected_when_strict() {
        let mut reply = sample_reply();
        reply["concepts"][1]["id"] = json!("attn");
        let err = parse_analysis(&reply.to_string(), ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::DuplicateConceptId(ref id)) if id == "attn"
        ));
    }

    #[test]
    fn malformed_and_blank_replies_fail() {
        assert!(matches!(
            parse_analysis("{ not json", ValidationPolicy::Lenient),
            Err(AnalysisError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_analysis("   ", ValidationPolicy::Lenient),
            Err(AnalysisError::EmptyResponse)
        ));
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("Strict".parse::<ValidationPolicy>().unwrap(), ValidationPolicy::Strict);
        assert_eq!(" lenient ".parse::<ValidationPolicy>().unwrap(), ValidationPolicy::Lenient);
        assert!("loose".parse::<ValidationPolicy>().is_err());
    }

    #[test]
    fn fence_tag_case_and_leading_prose_are_ignored() {
        let upper = format!("```JSON\n{}\n```", sample_reply());
        assert!(parse_analysis(&upper, ValidationPolicy::Strict).is_ok());

        let chatty = format!("Here is the analysis:\n```json\n{}\n```\nHope this helps.", sample_reply());
        let analysis = parse_analysis(&chatty, ValidationPolicy::Strict).unwrap();
        assert_eq!(analysis.title, "Attention Is All You Need");
    }

    #[test]
    fn lenient_mode_reads_loosely_typed_scalars() {
        let mut reply = sample_reply();
        reply["concepts"][0]["id"] = json!(1);
        reply["metrics"][0]["value"] = json!("95");
        reply["publication_date"] = json!(2017);

        let analysis = parse_analysis(&reply.to_string(), ValidationPolicy::Lenient).unwrap();
        assert_eq!(analysis.concepts[0].id, "1");
        assert_eq!(analysis.metrics[0].value, 95.0);
        assert_eq!(analysis.publication_date, "2017");
    }

    #[test]
    fn strict_mode_names_the_mistyped_field() {
        let mut reply = sample_reply();
        reply["concepts"][0]["id"] = json!(1);
        let err = parse_analysis(&reply.to_string(), ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::WrongType { ref field, expected: "string" })
                if field == "concepts[0].id"
        ));

        let mut reply = sample_reply();
        reply["metrics"][0]["value"] = json!("95");
        let err = parse_analysis(&reply.to_string(), ValidationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::WrongType { ref field, expected: "number" })
                if field == "metrics[0].value"
        ));
    }
}
