//! End-to-end tests: a scripted model driving the built-in tools through the
//! full loop, and one run against a local OpenAI-compatible HTTP endpoint.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::json;
use stepwise_agent::{TaskDigest, TerminationReason, ToolLoop, extract_digest};
use stepwise_config::AppConfig;
use stepwise_core::{
    FinalStep, Message, ModelClient, ModelError, ModelRequest, ModelResponse, Role, ToolRegistry,
};
use stepwise_protocol::FEEDBACK_HEADER;
use stepwise_tools::default_registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Scripted model ───────────────────────────────────────────────────────

/// Returns canned replies in order and records every request.
struct ScriptedModel {
    replies: Vec<String>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.into_iter().map(Into::into).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_message(&self) -> Message {
        let requests = self.requests.lock().unwrap();
        requests.last().unwrap().messages.last().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len().min(self.replies.len() - 1);
        requests.push(request);
        Ok(ModelResponse::text(self.replies[index].clone(), "mock"))
    }
}

fn tool_loop(model: Arc<ScriptedModel>) -> ToolLoop {
    ToolLoop::new(model, Arc::new(default_registry()))
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_calculator_then_answer() {
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[{"name":"calculator","arguments":{"expression":"6 * 7"}}],"answer":null}"#,
        r#"{"step":"final","toolCalls":[],"answer":"6 * 7 is 42"}"#,
    ]);

    let result = tool_loop(model.clone())
        .run("What is 6 times 7?", "You are a calculator assistant.")
        .await
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Completed);
    assert_eq!(result.answer, "6 * 7 is 42");
    assert_eq!(result.raw_tool_outputs, vec!["42"]);
    assert_eq!(result.iterations, 2);
    assert_eq!(model.calls(), 2);

    let feedback = model.last_message();
    assert_eq!(feedback.role, Role::User);
    assert_eq!(feedback.content, format!("{FEEDBACK_HEADER}\nTOOL_RESULT calculator: 42"));
}

#[tokio::test]
async fn e2e_system_prompt_lists_every_tool() {
    let model = ScriptedModel::new([r#"{"step":"final","answer":"ok"}"#]);
    tool_loop(model.clone()).run("hi", "Be brief.").await.unwrap();

    let requests = model.requests.lock().unwrap();
    let system = &requests[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.starts_with("Be brief."));
    for name in default_registry().names() {
        assert!(system.content.contains(name), "missing {name}");
    }
    assert_eq!(requests[0].tools.len(), default_registry().descriptors().len());
}

#[tokio::test]
async fn e2e_notes_persist_within_one_run() {
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[{"name":"remember","arguments":{"key":"list_id","value":"L-17"}}]}"#,
        r#"{"step":"tool","toolCalls":[{"name":"recall","arguments":{"key":"list_id"}}]}"#,
        r#"{"step":"final","answer":"Using list L-17"}"#,
    ]);

    let result = tool_loop(model).run("Pick a list", "").await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.raw_tool_outputs[1], "L-17");
    assert_eq!(result.context.get("list_id"), Some(&json!("L-17")));

    // A second run starts with an empty context.
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[{"name":"recall","arguments":{"key":"list_id"}}]}"#,
        r#"{"step":"final","answer":"nothing"}"#,
    ]);
    let fresh = tool_loop(model).run("Recall", "").await.unwrap();
    assert!(fresh.raw_tool_outputs[0].starts_with("ERROR: "));
    assert!(fresh.context.is_empty());
}

#[tokio::test]
async fn e2e_failures_are_fed_back_in_order() {
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[
            {"name":"no_such_tool","arguments":{}},
            {"name":"calculator","arguments":{"expression":"1 / 0"}},
            {"name":"reverse_string","arguments":{"text":"hello"}},
            {"name":"calculate_fibonacci","arguments":{"n":"ten"}}
        ]}"#,
        r#"{"step":"final","answer":"partial"}"#,
    ]);

    let result = tool_loop(model.clone()).run("Do things", "").await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.raw_tool_outputs.len(), 4);
    assert_eq!(result.raw_tool_outputs[0], "ERROR: Tool not found: no_such_tool");
    assert!(result.raw_tool_outputs[1].starts_with("ERROR: Tool execution failed: calculator"));
    assert_eq!(result.raw_tool_outputs[2], "olleh");
    assert!(
        result.raw_tool_outputs[3].starts_with("ERROR: Invalid arguments for calculate_fibonacci")
    );

    let feedback = model.last_message().content;
    let lines: Vec<&str> = feedback.lines().collect();
    assert_eq!(lines[0], FEEDBACK_HEADER);
    assert!(lines[1].starts_with("TOOL_RESULT no_such_tool: ERROR:"));
    assert_eq!(lines[3], "TOOL_RESULT reverse_string: olleh");
}

#[tokio::test]
async fn e2e_malformed_replies_are_repaired() {
    let model = ScriptedModel::new([
        "Sure! ```json\n{\"step\": tool, \"toolCalls\": [{\"name\": \"calculate_fibonacci\", \"arguments\": {\"n\": 10},},],}\n```",
        r#"{"step": final, "answer": "F(10) is 55", "summary": {"title": "Fib", "priority": high,},}"#,
    ]);

    let result = tool_loop(model).run("fib(10)?", "").await.unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Completed);
    assert_eq!(result.raw_tool_outputs, vec!["55"]);
    assert_eq!(result.answer, "F(10) is 55");
    let summary = result.summary.unwrap();
    assert_eq!(summary.get("priority"), Some(&json!("high")));
}

#[tokio::test]
async fn e2e_prose_reply_becomes_the_answer() {
    let model = ScriptedModel::new(["The answer is 4."]);
    let result = tool_loop(model).run("2+2?", "").await.unwrap();
    assert!(result.is_completed());
    assert_eq!(result.answer, "The answer is 4.");
    assert!(result.raw_tool_outputs.is_empty());
}

#[tokio::test]
async fn e2e_budget_is_enforced() {
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[{"name":"reverse_string","arguments":{"text":"ab"}}]}"#,
    ]);

    let result = tool_loop(model.clone())
        .with_max_iterations(3)
        .run("loop forever", "")
        .await
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::IterationBudgetExceeded);
    assert_eq!(model.calls(), 3);
    assert_eq!(result.raw_tool_outputs, vec!["ba", "ba", "ba"]);
    assert!(result.answer.contains("3 model calls"));
}

#[tokio::test]
async fn e2e_unrecoverable_reply_keeps_collected_outputs() {
    let model = ScriptedModel::new([
        r#"{"step":"tool","toolCalls":[{"name":"calculator","arguments":{"expression":"2 ^ 10"}}]}"#,
        r#"{"step": "final", "answer": "unterminated"#,
    ]);

    let result = tool_loop(model).run("2^10", "").await.unwrap();

    assert_eq!(result.termination_reason, TerminationReason::ProtocolFailure);
    assert_eq!(result.raw_tool_outputs, vec!["1024"]);
    assert!(result.failure.is_some());
    assert!(result.into_result().is_err());
}

#[tokio::test]
async fn e2e_digest_summary() {
    let model = ScriptedModel::new([json!({
        "step": "final",
        "toolCalls": [],
        "answer": "You have one overdue task.",
        "summary": {
            "title": "Today",
            "summary": "One task needs attention",
            "total_items": 1,
            "priority": "HIGH",
            "overdue": [{"name": "File taxes", "due_date": "2026-04-15", "urgency": "high"}]
        }
    })
    .to_string()]);

    let result = tool_loop(model).run("What's due?", "").await.unwrap();
    let step = FinalStep {
        answer: result.answer.clone(),
        summary: result.summary.clone(),
    };

    let digest: TaskDigest = extract_digest(&step).unwrap();
    assert_eq!(digest.title, "Today");
    assert_eq!(digest.overdue[0].name, "File taxes");
    assert!(digest.to_markdown().contains("File taxes"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["termination_reason"], "completed");
    assert_eq!(json["summary"]["total_items"], 1);
}

// ── Over HTTP ────────────────────────────────────────────────────────────

/// Serve one chat-completions reply per connection, in order.
async fn serve_replies(replies: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for content in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let body = json!({
                "model": "local-model",
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })
            .to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });
    format!("http://{addr}/v1")
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|l| {
                    l.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if raw.len() >= split + 4 + length {
                return;
            }
        }
    }
}

#[tokio::test]
async fn e2e_configured_http_provider() {
    let url = serve_replies(vec![
        r#"{"step":"tool","toolCalls":[{"name":"calculator","arguments":{"expression":"(2 + 3) * 4"}}]}"#,
        r#"{"step":"final","answer":"20"}"#,
    ])
    .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
default_provider = "inhouse"
api_key = "sk-local"

[agent]
max_iterations = 4

[providers.inhouse]
api_url = "{url}"
default_model = "local-model"
"#
    )
    .unwrap();

    let config = AppConfig::load_from(file.path()).unwrap();
    let client = stepwise_providers::build_from_config(&config).unwrap();
    assert_eq!(client.name(), "inhouse");

    let result = ToolLoop::new(client, Arc::new(default_registry()))
        .with_max_iterations(config.agent.max_iterations)
        .run("(2 + 3) * 4?", "")
        .await
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Completed);
    assert_eq!(result.answer, "20");
    assert_eq!(result.raw_tool_outputs, vec!["20"]);
    assert_eq!(result.iterations, 2);
}
