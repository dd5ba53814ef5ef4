use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

use marketmatch::config::Config;
use marketmatch::llm::LlmGateway;

/// A gateway pointed at the mock model server.
pub fn gateway_for(server: &MockServer) -> LlmGateway {
    let config = Config {
        openai_api_key: "test-key".to_string(),
        openai_base_url: server.uri(),
        ..Default::default()
    };
    LlmGateway::new(&config).expect("failed to build gateway")
}

/// A chat completion body whose assistant message carries `content`.
pub fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    })
}

/// Serves the given responses in order; panics on extra calls.
pub struct SeqResponder {
    calls: AtomicUsize,
    responses: Vec<ResponseTemplate>,
}

impl SeqResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            responses,
        }
    }
}

impl Respond for SeqResponder {
    fn respond(&self, _: &wiremock::Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(call) {
            Some(response) => response.clone(),
            None => panic!("no scripted response for call {call}"),
        }
    }
}

/// Mount scripted chat-completion responses, expecting exactly that many
/// calls.
pub async fn mount_chat(server: &MockServer, responses: Vec<ResponseTemplate>) {
    let expected = responses.len() as u64;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(SeqResponder::new(responses))
        .expect(expected)
        .mount(server)
        .await;
}
