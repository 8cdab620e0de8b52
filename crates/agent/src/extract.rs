//! Result extraction: structured data from a final step.
//!
//! The summary is opaque to the loop. [`TaskDigest`] is a typed view for the
//! common "task overview" shape; callers with other shapes use
//! [`StructuredSummary::parse_as`] with their own types.

use serde::{Deserialize, Deserializer, Serialize};
use stepwise_core::{FinalStep, StructuredSummary};
use tracing::debug;

/// The summary attached to a final step, unchanged.
pub fn extract(step: &FinalStep) -> Option<StructuredSummary> {
    step.summary.clone()
}

/// The summary read as a [`TaskDigest`], if it has that shape.
pub fn extract_digest(step: &FinalStep) -> Option<TaskDigest> {
    let summary = step.summary.as_ref()?;
    match summary.parse_as::<TaskDigest>() {
        Ok(digest) => Some(digest),
        Err(e) => {
            debug!(error = %e, "Summary is not a task digest");
            None
        }
    }
}

/// Overall or per-item urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Case-insensitive; anything unrecognised is `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Priority::High,
            "LOW" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Priority::parse).unwrap_or_default())
    }
}

/// One task mentioned in a digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub urgency: Priority,
}

/// Task overview produced by reminder / planning prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDigest {
    pub title: String,
    pub summary: String,
    pub total_items: u32,
    pub priority: Priority,
    pub highlights: Vec<String>,
    pub due_soon: Vec<DigestItem>,
    pub overdue: Vec<DigestItem>,
    pub active_tasks: Vec<DigestItem>,
}

impl TaskDigest {
    /// Render for display or storage.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# {}\n\n", self.title);

        if !self.summary.is_empty() {
            md.push_str(&self.summary);
            md.push_str("\n\n");
        }

        md.push_str(&format!(
            "**Items:** {} | **Priority:** {}\n\n",
            self.total_items,
            self.priority.as_str()
        ));

        if !self.highlights.is_empty() {
            md.push_str("## Highlights\n");
            for highlight in &self.highlights {
                md.push_str(&format!("- {highlight}\n"));
            }
            md.push('\n');
        }

        push_items(&mut md, "Active tasks", &self.active_tasks);
        push_items(&mut md, "Due soon", &self.due_soon);
        push_items(&mut md, "Overdue", &self.overdue);

        md.trim_end().to_string()
    }
}

fn push_items(md: &mut String, heading: &str, items: &[DigestItem]) {
    if items.is_empty() {
        return;
    }

    md.push_str(&format!("## {heading}\n"));
    for item in items {
        md.push_str(&format!("- **{}**", item.name));
        if let Some(category) = &item.category {
            md.push_str(&format!(" ({category})"));
        }
        if item.urgency != Priority::Medium {
            md.push_str(&format!(" [{}]", item.urgency.as_str()));
        }
        md.push('\n');
        if let Some(due) = &item.due_date {
            md.push_str(&format!("  - Due: {due}\n"));
        }
        if let Some(description) = &item.description {
            md.push_str(&format!("  - {description}\n"));
        }
    }
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn final_with(summary: serde_json::Value) -> FinalStep {
        FinalStep {
            answer: "ok".into(),
            summary: StructuredSummary::from_value(summary),
        }
    }

    #[test]
    fn extract_passes_summary_through() {
        let step = final_with(json!({"anything": [1, 2]}));
        assert_eq!(extract(&step), step.summary);
        assert!(extract(&FinalStep::answer("plain")).is_none());
    }

    #[test]
    fn digest_from_summary() {
        let step = final_with(json!({
            "title": "This week",
            "summary": "Two things left.",
            "total_items": 2,
            "priority": "high",
            "highlights": ["Dentist on Friday"],
            "due_soon": [{"name": "Dentist", "due_date": "2025-12-19 10:00", "urgency": "HIGH"}],
            "active_tasks": [{"name": "Taxes", "category": "ADMIN"}]
        }));
        let digest = extract_digest(&step).unwrap();
        assert_eq!(digest.priority, Priority::High);
        assert_eq!(digest.due_soon[0].urgency, Priority::High);
        assert_eq!(digest.active_tasks[0].urgency, Priority::Medium);
        assert!(digest.overdue.is_empty());

        let md = digest.to_markdown();
        assert!(md.starts_with("# This week\n\nTwo things left."));
        assert!(md.contains("**Items:** 2 | **Priority:** HIGH"));
        assert!(md.contains("- **Dentist** [HIGH]\n  - Due: 2025-12-19 10:00"));
        assert!(md.contains("- **Taxes** (ADMIN)"));
        assert!(!md.contains("## Overdue"));
    }

    #[test]
    fn unknown_priority_is_medium() {
        let step = final_with(json!({"title": "t", "priority": "URGENT!!"}));
        assert_eq!(extract_digest(&step).unwrap().priority, Priority::Medium);
        let step = final_with(json!({"title": "t", "priority": null}));
        assert_eq!(extract_digest(&step).unwrap().priority, Priority::Medium);
    }

    #[test]
    fn mismatched_shape_is_not_a_digest() {
        let step = final_with(json!({"total_items": "many"}));
        assert!(extract_digest(&step).is_none());
    }
}
