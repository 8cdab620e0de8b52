//! `stepwise decode`: inspect how a raw model reply is decoded.

use std::io::Read;
use std::path::Path;
use stepwise_core::StepResponse;
use stepwise_protocol::{Decoded, decode_with_report, encode_step, repair_with_report, strip_fences};

pub async fn run(file: Option<&Path>, repair_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if repair_only {
        let repaired = repair_with_report(strip_fences(&raw));
        for rule in &repaired.applied {
            eprintln!("  applied: {}", rule.name());
        }
        println!("{}", repaired.text);
        return Ok(());
    }

    let decoded = decode_with_report(&raw)?;
    print!("{}", report(&decoded));
    Ok(())
}

fn report(decoded: &Decoded) -> String {
    let mut out = String::new();
    out.push_str(&format!("step:     {}\n", decoded.step.kind()));

    let repairs = if decoded.repairs.is_empty() {
        "none".to_string()
    } else {
        decoded
            .repairs
            .iter()
            .map(|rule| rule.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    out.push_str(&format!("repairs:  {repairs}\n"));
    if decoded.degraded {
        out.push_str("degraded: reply was prose, used verbatim as the answer\n");
    }

    if let StepResponse::Tool(step) = &decoded.step {
        for (i, call) in step.calls.iter().enumerate() {
            out.push_str(&format!("call {}:   {} {}\n", i + 1, call.name, call.arguments_value()));
        }
    }

    out.push_str(&format!("canonical: {}\n", encode_step(&decoded.step)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_repairs_and_calls() {
        let decoded = decode_with_report(
            r#"{"step": tool, "toolCalls": [{"name": "calculator", "arguments": {"expression": "1+1"}}],}"#,
        )
        .unwrap();
        let text = report(&decoded);
        assert!(text.contains("step:     tool"));
        assert!(text.contains("repairs:  "));
        assert!(!text.contains("repairs:  none"));
        assert!(text.contains(r#"call 1:   calculator {"expression":"1+1"}"#));
        assert!(text.contains(r#"canonical: {"step":"tool""#));
    }

    #[test]
    fn report_marks_prose() {
        let decoded = decode_with_report("Just an answer.").unwrap();
        let text = report(&decoded);
        assert!(text.contains("step:     final"));
        assert!(text.contains("repairs:  none"));
        assert!(text.contains("degraded"));
    }

    #[tokio::test]
    async fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "```json\n{\"step\":\"final\",\"answer\":\"ok\"}\n```").unwrap();
        run(Some(path.as_path()), false).await.unwrap();
        run(Some(path.as_path()), true).await.unwrap();
        assert!(run(Some(dir.path().join("missing.txt").as_path()), false).await.is_err());
    }
}
