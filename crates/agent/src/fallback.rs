use std::sync::Arc;

use parchi_core::ConversationContext;
use tracing::{debug, warn};

use crate::guardrails::{Classification, FallbackPolicy, GuardrailDecision};
use crate::llm::LlmClient;
use crate::schema;

/// Classification of last resort for messages the keyword router could
/// not place. Wraps a completion client behind schema validation and
/// guardrails so the rest of the system only ever sees a vetted
/// [`Classification`] or nothing at all.
pub struct FallbackAdapter {
    client: Arc<dyn LlmClient>,
    policy: FallbackPolicy,
    catalog_names: Vec<String>,
}

impl FallbackAdapter {
    pub fn new(client: Arc<dyn LlmClient>, catalog_names: Vec<String>) -> Self {
        Self { client, policy: FallbackPolicy::default(), catalog_names }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Asks the model to classify text the keyword router gave up on.
    /// Every failure mode returns `None`; the caller falls back to its
    /// deterministic reply and the customer never sees an adapter error.
    pub async fn try_classify(
        &self,
        text: &str,
        context: &ConversationContext,
    ) -> Option<Classification> {
        let prompt = self.build_prompt(text, context);

        let completion = match self.client.complete(&prompt).await {
            Ok(completion) => completion,
            Err(error) => {
                debug!(error = %error, "fallback completion failed");
                return None;
            }
        };

        let reply = match schema::parse_reply(&completion) {
            Ok(reply) => reply,
            Err(error) => {
                debug!(error = %error, "fallback reply failed schema validation");
                return None;
            }
        };

        match self.policy.evaluate(&reply) {
            GuardrailDecision::Allow(classification) => Some(classification),
            GuardrailDecision::Degrade { reason_code } => {
                debug!(reason_code, "fallback degraded to deterministic path");
                None
            }
            GuardrailDecision::Deny { reason_code } => {
                warn!(reason_code, "fallback reply denied by guardrails");
                None
            }
        }
    }

    fn build_prompt(&self, text: &str, context: &ConversationContext) -> String {
        format!(
            "You classify one message from a pharmacy order chat.\n\
             Reply with a single JSON object and nothing else:\n\
             {{\"intent\": \"check_stock\"|\"create_invoice\"|\"get_invoice\"|\"approve_invoice\"|\"unknown\",\n \
             \"product\": string?, \"quantity\": integer?, \"customer\": string?,\n \
             \"confidence\": \"low\"|\"medium\"|\"high\"}}\n\
             Omit fields you are not sure about. Use \"unknown\" when the message is not about any of these.\n\
             Known products: {products}\n\
             Conversation state: {state}\n\
             Message: {text}",
            products = self.catalog_names.join(", "),
            state = context.state.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use parchi_core::{ConversationContext, Intent};

    use super::FallbackAdapter;
    use crate::llm::LlmClient;

    struct CannedClient(&'static str);

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    struct RecordingClient {
        prompt: Mutex<String>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn complete(&self, prompt: &str) -> Result<String> {
            *self.prompt.lock().unwrap() = prompt.to_string();
            Ok(r#"{"intent": "unknown", "confidence": "low"}"#.to_string())
        }
    }

    fn adapter(client: impl LlmClient + 'static) -> FallbackAdapter {
        FallbackAdapter::new(
            Arc::new(client),
            vec!["Dolo 650".to_string(), "Crocin Advance".to_string()],
        )
    }

    #[tokio::test]
    async fn fenced_order_reply_becomes_a_classification() {
        let adapter = adapter(CannedClient(
            "```json\n{\"intent\": \"create_invoice\", \"product\": \"Dolo 650\", \
             \"quantity\": 2, \"customer\": \"Rahul\", \"confidence\": \"high\"}\n```",
        ));
        let context = ConversationContext::new("chat-1");

        let classification = adapter
            .try_classify("bhaiya wahi bukhar wali dawai bhej do", &context)
            .await
            .expect("order classification");

        assert_eq!(classification.intent, Intent::Order);
        assert_eq!(classification.product.as_deref(), Some("Dolo 650"));
        assert_eq!(classification.quantity, Some(2));
        assert_eq!(classification.customer.as_deref(), Some("Rahul"));
    }

    #[tokio::test]
    async fn transport_failure_is_a_quiet_none() {
        let adapter = adapter(FailingClient);
        let context = ConversationContext::new("chat-1");
        assert!(adapter.try_classify("kuch bhi", &context).await.is_none());
    }

    #[tokio::test]
    async fn prose_instead_of_json_is_a_quiet_none() {
        let adapter = adapter(CannedClient("The customer seems to want paracetamol."));
        let context = ConversationContext::new("chat-1");
        assert!(adapter.try_classify("kuch bhi", &context).await.is_none());
    }

    #[tokio::test]
    async fn approval_attempt_never_surfaces() {
        let adapter =
            adapter(CannedClient(r#"{"intent": "approve_invoice", "confidence": "high"}"#));
        let context = ConversationContext::new("chat-1");
        assert!(adapter.try_classify("approve kar do", &context).await.is_none());
    }

    #[tokio::test]
    async fn low_confidence_never_surfaces() {
        let adapter = adapter(CannedClient(
            r#"{"intent": "create_invoice", "product": "Dolo 650", "confidence": "low"}"#,
        ));
        let context = ConversationContext::new("chat-1");
        assert!(adapter.try_classify("dawai?", &context).await.is_none());
    }

    #[tokio::test]
    async fn prompt_carries_catalog_and_state() {
        let client = Arc::new(RecordingClient { prompt: Mutex::new(String::new()) });
        let adapter = FallbackAdapter::new(
            client.clone(),
            vec!["Dolo 650".to_string(), "Benadryl Syrup".to_string()],
        );
        let context = ConversationContext::new("chat-9");

        let _ = adapter.try_classify("haan bhej do", &context).await;

        let prompt = client.prompt.lock().unwrap().clone();
        assert!(prompt.contains("Dolo 650, Benadryl Syrup"));
        assert!(prompt.contains("Conversation state: idle"));
        assert!(prompt.contains("Message: haan bhej do"));
    }
}
