//! Core query agent implementation.

pub mod prompt;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, OpenRouterClient};
use crate::query;

use self::prompt::build_system_prompt;
use self::response::Response;

/// Outcome of validating a candidate response.
#[derive(Debug, Clone)]
pub enum Validation {
    /// Candidate is final.
    Accepted(Response),
    /// Candidate was rejected; carries feedback for the next attempt.
    RetryRequested(String),
}

/// Validate a candidate response.
///
/// An `InvalidRequest` is accepted unconditionally. A `Success` is accepted
/// only if its query string parses in the document store's extended JSON
/// dialect; otherwise the parse error becomes retry feedback.
pub fn validate(candidate: Response) -> Validation {
    match &candidate {
        Response::InvalidRequest(_) => Validation::Accepted(candidate),
        Response::Success(success) => match query::parse_filter(&success.mongo_query) {
            Ok(_) => Validation::Accepted(candidate),
            Err(e) => Validation::RetryRequested(format!("Query validation failed: {}", e)),
        },
    }
}

/// The query agent.
///
/// Holds the immutable configuration and the LLM backend. Invocations share
/// no mutable state, so one agent can serve concurrent `translate` calls.
pub struct QueryAgent {
    config: Config,
    llm: Arc<dyn LlmClient>,
}

impl QueryAgent {
    /// Create a new agent with the given configuration.
    pub fn new(config: Config) -> Self {
        let llm = Arc::new(OpenRouterClient::with_base_url(
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
            config.base_url.clone(),
        ));

        Self { config, llm }
    }

    /// Create an agent with a custom LLM client (useful for testing).
    pub fn with_client(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        Self { config, llm }
    }

    /// Translate one natural-language request into a filter query, or a
    /// rejection when the request cannot be serviced against the schema.
    ///
    /// `today` anchors relative temporal language in the request. A returned
    /// `Success` is guaranteed to carry a query that already re-parsed under
    /// the extended JSON dialect; rejected candidates are regenerated with
    /// the failure as feedback, up to `config.max_retries` attempts.
    pub async fn translate(
        &self,
        prompt: &str,
        today: DateTime<Utc>,
    ) -> anyhow::Result<Response> {
        let system_prompt = build_system_prompt(today);
        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(prompt),
        ];

        let output_schema = response::output_schema();

        for attempt in 0..self.config.max_retries {
            tracing::debug!("Generation attempt {}", attempt + 1);

            let completion = self
                .llm
                .chat_completion(&self.config.default_model, &messages, Some(&output_schema))
                .await?;

            let feedback = match response::decode(&completion) {
                Ok(candidate) => match validate(candidate) {
                    Validation::Accepted(accepted) => return Ok(accepted),
                    Validation::RetryRequested(feedback) => feedback,
                },
                Err(e) => format!("Response validation failed: {}", e),
            };

            tracing::warn!("Attempt {} rejected: {}", attempt + 1, feedback);

            // Feed the failure back so the next attempt can self-correct.
            messages.push(ChatMessage::assistant(completion));
            messages.push(ChatMessage::user(format!(
                "{}. Respond again with a corrected JSON object.",
                feedback
            )));
        }

        Err(anyhow::anyhow!(
            "Max retries ({}) reached without a valid response",
            self.config.max_retries
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    /// LLM test double that replays canned completions and records the
    /// conversation it was called with.
    struct ScriptedClient {
        completions: Mutex<VecDeque<String>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(completions: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                completions: Mutex::new(
                    completions.iter().map(|c| c.to_string()).collect(),
                ),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn messages_of_call(&self, index: usize) -> Vec<ChatMessage> {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _response_format: Option<&serde_json::Value>,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.completions
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::EmptyResponse)
        }
    }

    fn agent_with(client: Arc<ScriptedClient>) -> QueryAgent {
        let config = Config::new("test-key".to_string(), "test-model".to_string());
        QueryAgent::with_client(config, client)
    }

    fn test_today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 8, 22, 20, 51).unwrap()
    }

    fn success_completion(query: &str) -> String {
        serde_json::to_string(&serde_json::json!({
            "mongo_query": query,
            "explanation": "Matches fixtures for the requested teams."
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_query_first_attempt() {
        let query = r#"{"$or": [{"home_team": "Arsenal", "away_team": "Man Utd"}, {"home_team": "Man Utd", "away_team": "Arsenal"}]}"#;
        let client = ScriptedClient::new(&[&success_completion(query)]);
        let agent = agent_with(client.clone());

        let response = agent
            .translate("When will Arsenal play Man Utd?", test_today())
            .await
            .unwrap();

        let success = match response {
            Response::Success(s) => s,
            other => panic!("expected Success, got {:?}", other),
        };

        // Symmetric $or over home/away: equivalent to either ordering.
        let doc = query::parse_filter(&success.mongo_query).unwrap();
        let expected = query::parse_filter(query).unwrap();
        assert_eq!(doc, expected);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn accepts_team_involvement_query() {
        let query = r#"{"$or": [{"home_team": "Arsenal"}, {"away_team": "Arsenal"}]}"#;
        let client = ScriptedClient::new(&[&success_completion(query)]);
        let agent = agent_with(client);

        let response = agent
            .translate("How many fixtures do Arsenal have?", test_today())
            .await
            .unwrap();

        match response {
            Response::Success(success) => {
                let doc = query::parse_filter(&success.mongo_query).unwrap();
                assert!(doc.get_array("$or").is_ok());
            }
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn accepts_remaining_games_query_with_date_bound() {
        let query = r#"{"$or": [{"home_team": "Arsenal"}, {"away_team": "Arsenal"}],"date": {"$gt": {"$date": "2024-12-08T22:20:51.322933Z"}}}"#;
        let client = ScriptedClient::new(&[&success_completion(query)]);
        let agent = agent_with(client);

        let response = agent
            .translate("How many games do Arsenal have left?", test_today())
            .await
            .unwrap();

        match response {
            Response::Success(success) => {
                let doc = query::parse_filter(&success.mongo_query).unwrap();
                let bound = doc.get_document("date").unwrap();
                assert!(matches!(bound.get("$gt"), Some(bson::Bson::DateTime(_))));
            }
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn accepts_invalid_request_unconditionally() {
        let client =
            ScriptedClient::new(&[r#"{"error_message": "Historical questions are out of scope."}"#]);
        let agent = agent_with(client.clone());

        let response = agent
            .translate("Tell me about the history of Arsenal FC.", test_today())
            .await
            .unwrap();

        match response {
            Response::InvalidRequest(invalid) => {
                assert!(!invalid.error_message.is_empty());
            }
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_unparseable_query_with_feedback() {
        let bad = success_completion(r#"{"home_team": "Arsenal""#);
        let good = success_completion(r#"{"home_team": "Arsenal"}"#);
        let client = ScriptedClient::new(&[&bad, &good]);
        let agent = agent_with(client.clone());

        let response = agent
            .translate("Arsenal home fixtures", test_today())
            .await
            .unwrap();

        assert!(matches!(response, Response::Success(_)));
        assert_eq!(client.call_count(), 2);

        // Second attempt sees the rejected completion plus the parse error.
        let retry_messages = client.messages_of_call(1);
        assert_eq!(retry_messages.len(), 4);
        assert!(retry_messages[3].content.contains("Query validation failed"));
    }

    #[tokio::test]
    async fn retries_unrecognized_shape() {
        let good = success_completion(r#"{"home_team": "Arsenal"}"#);
        let client = ScriptedClient::new(&[r#"{"answer": "tomorrow"}"#, &good]);
        let agent = agent_with(client.clone());

        let response = agent
            .translate("Arsenal home fixtures", test_today())
            .await
            .unwrap();

        assert!(matches!(response, Response::Success(_)));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_error() {
        let bad = success_completion("not a json document");
        let client = ScriptedClient::new(&[&bad, &bad, &bad]);
        let agent = agent_with(client.clone());

        let err = agent
            .translate("Arsenal fixtures", test_today())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Max retries (3)"));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn backend_errors_propagate_without_retry() {
        // Empty script: the first call already fails.
        let client = ScriptedClient::new(&[]);
        let agent = agent_with(client.clone());

        let err = agent
            .translate("Arsenal fixtures", test_today())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty response"));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn conversation_starts_with_schema_prompt_and_request() {
        let client =
            ScriptedClient::new(&[r#"{"error_message": "cannot help with that"}"#]);
        let agent = agent_with(client.clone());

        agent
            .translate("What is the capital of France?", test_today())
            .await
            .unwrap();

        let messages = client.messages_of_call(0);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("\"fixtures\""));
        assert_eq!(messages[1].content, "What is the capital of France?");
    }

    #[test]
    fn validation_is_idempotent_for_accepted_queries() {
        let success = response::Success {
            mongo_query: r#"{"$or": [{"home_team": "Arsenal"}, {"away_team": "Arsenal"}]}"#
                .to_string(),
            explanation: "All Arsenal fixtures.".to_string(),
        };

        for _ in 0..2 {
            match validate(Response::Success(success.clone())) {
                Validation::Accepted(_) => {}
                Validation::RetryRequested(feedback) => {
                    panic!("unexpected retry: {}", feedback)
                }
            }
        }
    }

    #[test]
    fn validation_requests_retry_with_parse_error() {
        let success = response::Success {
            mongo_query: "SELECT * FROM fixtures".to_string(),
            explanation: "Not a filter document.".to_string(),
        };

        match validate(Response::Success(success)) {
            Validation::RetryRequested(feedback) => {
                assert!(feedback.contains("Query validation failed"));
            }
            Validation::Accepted(_) => panic!("expected retry"),
        }
    }
}
