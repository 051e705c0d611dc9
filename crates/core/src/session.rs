use crate::agent::AnswerAgent;
use crate::prompt::{BUSY_MESSAGE, GREETING, NO_ANSWER_MESSAGE};
use crate::ConversationTurn;
use tracing::{error, info};

/// Conversation state for one user. Every exchange appends exactly two turns.
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: Vec<ConversationTurn>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            turns: vec![ConversationTurn::assistant(GREETING)],
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Answers `input` with the prior turns as history. Agent failures become a
    /// polite reply instead of an error.
    pub async fn ask(&mut self, agent: &AnswerAgent, input: &str) -> String {
        let reply = match agent.invoke(input, &self.turns).await {
            Ok(result) if result.output.trim().is_empty() => NO_ANSWER_MESSAGE.to_string(),
            Ok(result) => {
                info!(tool_calls = result.steps.len(), "answered user message");
                result.output
            }
            Err(err) => {
                error!(error = %err, model = agent.model_name(), "agent failed");
                BUSY_MESSAGE.to_string()
            }
        };

        self.turns.push(ConversationTurn::human(input));
        self.turns.push(ConversationTurn::assistant(reply.clone()));
        reply
    }

    pub fn clear(&mut self) {
        self.turns = vec![ConversationTurn::assistant(GREETING)];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::LexicalRetriever;
    use crate::llm::{ChatMessage, ChatModel, ModelReply, ToolDefinition};
    use crate::{AgentError, Record, Role};
    use async_trait::async_trait;

    struct FixedModel(Result<String, ()>);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ModelReply, AgentError> {
            match &self.0 {
                Ok(text) => Ok(ModelReply::Text(text.clone())),
                Err(()) => Err(AgentError::RateLimited {
                    provider: "fixed".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn agent(reply: Result<&str, ()>) -> AnswerAgent {
        let retriever = LexicalRetriever::from_records(vec![Record::new("Cúm gây sốt")], 4);
        AnswerAgent::new(
            Box::new(FixedModel(reply.map(str::to_string))),
            Box::new(retriever),
        )
    }

    #[test]
    fn new_session_starts_with_greeting() {
        let session = ChatSession::new();
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].role, Role::Assistant);
        assert_eq!(session.turns()[0].content, GREETING);
    }

    #[tokio::test]
    async fn each_exchange_appends_two_turns() {
        let mut session = ChatSession::new();
        let agent = agent(Ok("Bạn nên uống nhiều nước."));

        let reply = session.ask(&agent, "Tôi bị sốt").await;
        assert_eq!(reply, "Bạn nên uống nhiều nước.");
        session.ask(&agent, "Còn gì nữa?").await;

        let turns = session.turns();
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[1], ConversationTurn::human("Tôi bị sốt"));
        assert_eq!(turns[2], ConversationTurn::assistant("Bạn nên uống nhiều nước."));
    }

    #[tokio::test]
    async fn failure_yields_busy_message() {
        let mut session = ChatSession::new();
        let reply = session.ask(&agent(Err(())), "Tôi bị ho").await;
        assert_eq!(reply, BUSY_MESSAGE);
        assert_eq!(session.turns().len(), 3);
    }

    #[tokio::test]
    async fn empty_output_yields_apology() {
        let mut session = ChatSession::new();
        let reply = session.ask(&agent(Ok("  ")), "Tôi bị ho").await;
        assert_eq!(reply, NO_ANSWER_MESSAGE);
    }

    #[tokio::test]
    async fn clear_resets_to_greeting() {
        let mut session = ChatSession::new();
        session.ask(&agent(Ok("ok")), "xin chào").await;
        session.clear();
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].content, GREETING);
    }
}
