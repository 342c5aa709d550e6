//! Testing utilities for the Wireforge workspace
//!
//! Shared fixtures plus a deterministic model client that replays queued
//! replies in FIFO order.

#![allow(missing_docs)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use wf_core::{ChatRequest, ChunkStream, ModelClient, ModelError};

/// Interactive counter and controlled input, explicit mount (score 94)
pub const INTERACTIVE_COMPONENT: &str = r#"function App() {
  const [count, setCount] = React.useState(0);
  const [name, setName] = React.useState('');
  return (
    <div className="card">
      <input value={name} onChange={(e) => setName(e.target.value)} placeholder="Name" />
      <button onClick={() => setCount(count + 1)}>Clicked {count} times</button>
      <p>Hello {name}</p>
    </div>
  );
}
ReactDOM.render(<App />, document.getElementById('root'));"#;

/// Markup only; auto-repair lifts it to `partial`
pub const STATIC_COMPONENT: &str = r#"function App() {
  return (
    <div className="hero">
      <h1>Welcome</h1>
      <button>Get started</button>
    </div>
  );
}
ReactDOM.render(<App />, document.getElementById('root'));"#;

/// Static with no component function, so auto-repair has nothing to patch
pub const UNREPAIRABLE_STATIC: &str =
    "ReactDOM.render(<div><h1>Static page</h1></div>, document.getElementById('root'));";

/// Interactive but calls `eval`
pub const UNSAFE_COMPONENT: &str = r#"function App() {
  const [expr, setExpr] = React.useState('1 + 1');
  return (
    <div>
      <input value={expr} onChange={(e) => setExpr(e.target.value)} />
      <button onClick={() => setExpr(String(eval(expr)))}>Evaluate {expr}</button>
    </div>
  );
}
ReactDOM.render(<App />, document.getElementById('root'));"#;

/// Interactive and safe, but the JSX never closes
pub const SYNTAX_BROKEN: &str = r#"function App() {
  const [count, setCount] = React.useState(0);
  return (
    <div>
      <button onClick={() => setCount(count + 1)}>Clicked {count}</button>
  );
}
ReactDOM.render(<App />, document.getElementById('root'));"#;

/// Wrap code in a jsx fence the way models reply
#[must_use]
pub fn fenced(code: &str) -> String {
    format!("Here is your component:\n\n```jsx\n{code}\n```\n")
}

/// One queued model reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Full completion text; streamed as a single chunk
    Text(String),
    /// Streamed chunks; joined for `complete`
    Chunks(Vec<String>),
    /// Failure
    Error(ModelError),
}

impl Reply {
    /// Split `text` into chunks of at most `size` characters
    #[must_use]
    pub fn chunked(text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self::Chunks(chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect())
    }
}

/// Deterministic [`ModelClient`] that yields queued replies
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    delay: Duration,
    chunk_delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModelClient {
    /// Create an empty client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; replies are consumed in FIFO order
    #[must_use]
    pub fn with_reply(self, reply: Reply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    /// Queue a text reply
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(Reply::Text(text.into()))
    }

    /// Queue an error reply
    #[must_use]
    pub fn with_error(self, error: ModelError) -> Self {
        self.with_reply(Reply::Error(error))
    }

    /// Reply used once the queue is empty
    #[must_use]
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Delay before every reply
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay before every streamed chunk
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// User prompts received, in call order
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of model calls made
    #[must_use]
    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    async fn next_reply(&self, request: &ChatRequest) -> Reply {
        self.prompts
            .lock()
            .push(request.user_prompt().unwrap_or_default().to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let queued = self.replies.lock().pop_front();
        queued.or_else(|| self.fallback.clone()).unwrap_or_else(|| {
            Reply::Error(ModelError::Provider("ScriptedModelClient has no queued replies".to_string()))
        })
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        match self.next_reply(request).await {
            Reply::Text(text) => Ok(text),
            Reply::Chunks(chunks) => Ok(chunks.concat()),
            Reply::Error(error) => Err(error),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ModelError> {
        let chunks = match self.next_reply(request).await {
            Reply::Text(text) => vec![text],
            Reply::Chunks(chunks) => chunks,
            Reply::Error(error) => return Err(error),
        };

        let delay = self.chunk_delay;
        Ok(stream::iter(chunks)
            .then(move |chunk| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, ModelError>(chunk)
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wf_core::ChatMessage;

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user(prompt)],
            temperature: 0.7,
            max_tokens: 100,
            stream: false,
        }
    }

    #[tokio::test]
    async fn returns_replies_in_fifo_order() {
        let client = ScriptedModelClient::new().with_text("first").with_text("second");
        assert_eq!(client.complete(&request("a")).await.unwrap(), "first");
        assert_eq!(client.complete(&request("b")).await.unwrap(), "second");
        assert!(client.complete(&request("c")).await.is_err());
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fallback_repeats() {
        let client = ScriptedModelClient::new().with_fallback(Reply::Text("again".to_string()));
        for _ in 0..3 {
            assert_eq!(client.complete(&request("p")).await.unwrap(), "again");
        }
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn streams_chunks_in_order() {
        let client = ScriptedModelClient::new().with_reply(Reply::chunked("abcdefg", 3));
        let chunks: Vec<String> = client.stream(&request("p")).await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn fence_wraps_code() {
        assert!(fenced("x").contains("```jsx\nx\n```"));
    }
}
