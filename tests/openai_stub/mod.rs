use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// How the stub answers summarization prompts.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    /// Well-formed output for every prompt kind.
    Normal,
    /// Prose instead of JSON for structured prompts.
    MalformedStructured,
    /// HTTP 500 for the first N requests, then normal output.
    FailFirst(usize),
}

pub struct OpenAiStub {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(behavior: StubBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/responses" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let served = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if let StubBehavior::FailFirst(failures) = behavior
                    && served <= failures
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            r#"{"error":{"message":"stub transient failure"}}"#,
                        )
                        .with_status_code(500),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let instructions = parsed
                    .get("instructions")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let input = parsed
                    .get("input")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                let output_text = match prompt_response(instructions, input, behavior) {
                    Some(text) => text,
                    None => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("unknown prompt mode")
                                .with_status_code(400),
                        );
                        continue;
                    }
                };

                let response_body = serde_json::json!({
                    "id": "resp_stub",
                    "object": "response",
                    "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                    "output": [
                        {
                            "type": "message",
                            "role": "assistant",
                            "content": [
                                { "type": "output_text", "text": output_text }
                            ]
                        }
                    ],
                    "output_text": output_text
                });

                let mut response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Total summarization requests served, including deliberate failures.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn prompt_response(instructions: &str, input: &str, behavior: StubBehavior) -> Option<String> {
    let malformed = matches!(behavior, StubBehavior::MalformedStructured);

    if instructions.contains("quick summary") {
        Some("A concise stub summary of the page.".to_owned())
    } else if instructions.contains("detailed summary") {
        Some("## Overview\n\n- A stub bullet.\n- Another stub bullet.".to_owned())
    } else if instructions.contains("key points") {
        Some(if malformed {
            "I cannot produce JSON today.".to_owned()
        } else {
            r#"["First key point.","Second key point.","Third key point.","Fourth key point.","Fifth key point."]"#.to_owned()
        })
    } else if instructions.contains("action items") {
        Some(if malformed {
            "No list from me.".to_owned()
        } else {
            r#"["Review the stub output."]"#.to_owned()
        })
    } else if instructions.contains("fifteen-year-old") {
        Some("Imagine the page as a story told simply.".to_owned())
    } else if instructions.contains("key concepts") {
        Some(if malformed {
            "Concepts are hard.".to_owned()
        } else {
            r#"[{"term":"stub","definition":"a stand-in","analogy":"a cardboard cutout"}]"#
                .to_owned()
        })
    } else if instructions.contains("highlighting engine") {
        Some(highlight_response(input))
    } else {
        None
    }
}

/// One verbatim sentence from the prompt content plus one fabricated span.
fn highlight_response(input: &str) -> String {
    let verbatim = first_content_sentence(input).unwrap_or_default();
    serde_json::json!({
        "high": [verbatim],
        "medium": ["This exact sentence appears nowhere in the source."],
        "low": []
    })
    .to_string()
}

fn first_content_sentence(input: &str) -> Option<String> {
    let begin = "BEGIN_CONTENT\n";
    let start = input.find(begin)? + begin.len();
    let first_line = input[start..].lines().next()?;

    // Content lines carry positional markers like "[intro] ".
    let text = match first_line.find("] ") {
        Some(idx) => &first_line[idx + 2..],
        None => first_line,
    };
    let end = text.find(". ").map(|idx| idx + 1).unwrap_or(text.len());
    Some(text[..end].to_owned())
}
