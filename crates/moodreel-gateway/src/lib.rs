use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use moodreel_catalog::{MovieCatalog, TmdbCatalog};
use moodreel_core::messages;
use moodreel_core::{
    parse_input, transition, Action, ConversationState, Input, MoodreelConfig, Recommender, Reply,
    SessionStore,
};
use moodreel_schema::{InboundMessage, OutboundMessage};

pub struct Gateway {
    sessions: SessionStore,
    recommender: Recommender,
    acceptance_token: String,
    session_idle: Duration,
}

impl Gateway {
    pub fn new(
        recommender: Recommender,
        acceptance_token: impl Into<String>,
        session_idle: Duration,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            recommender,
            acceptance_token: acceptance_token.into(),
            session_idle,
        }
    }

    /// Wire the production TMDB catalog from config.
    pub fn from_config(config: &MoodreelConfig) -> Self {
        let catalog: Arc<dyn MovieCatalog> = Arc::new(TmdbCatalog::new(&config.catalog));
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: &MoodreelConfig, catalog: Arc<dyn MovieCatalog>) -> Self {
        let recommender = Recommender::new(config.conversation.resolver(), catalog);
        Self::new(
            recommender,
            config.conversation.acceptance_token.clone(),
            Duration::seconds(config.conversation.session_idle_secs),
        )
    }

    /// Whether `inbound` would go to the movie catalog, without changing any
    /// state. Channels use it to decide whether to show a typing indicator.
    pub async fn will_query_catalog(&self, inbound: &InboundMessage) -> bool {
        let current = self.sessions.state(&inbound.conversation_scope).await;
        let input = parse_input(&inbound.text, inbound.sender_name.as_deref());
        matches!(
            transition(current, &input, &self.acceptance_token).action,
            Action::Recommend(_)
        )
    }

    /// Drop conversations idle longer than the configured window.
    pub async fn evict_idle_sessions(&self) -> usize {
        let evicted = self.sessions.evict_idle(self.session_idle).await;
        if evicted > 0 {
            let remaining = self.sessions.len().await;
            tracing::info!(evicted, remaining, "evicted idle sessions");
        }
        evicted
    }

    pub async fn session_state(&self, conversation_scope: &str) -> Option<ConversationState> {
        self.sessions.state(conversation_scope).await
    }

    /// Run one inbound message through the conversation. Returns `None` when
    /// the message is deliberately left unanswered.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Option<OutboundMessage> {
        let scope = inbound.conversation_scope.as_str();
        let current = self.sessions.state(scope).await;
        let input = parse_input(&inbound.text, inbound.sender_name.as_deref());
        let step = transition(current, &input, &self.acceptance_token);

        match (&input, step.next) {
            (Input::Start { .. }, _) => self.sessions.reset(scope).await,
            (_, Some(next)) => self.sessions.set_state(scope, next).await,
            (_, None) => {}
        }
        if current != step.next {
            tracing::info!(
                trace_id = %inbound.trace_id,
                scope,
                from = ?current,
                to = ?step.next,
                "conversation state changed"
            );
        }

        let reply = match step.action {
            Action::Ignore => {
                tracing::debug!(trace_id = %inbound.trace_id, scope, "ignoring command");
                return None;
            }
            Action::Reply(reply) => reply,
            Action::Recommend(text) => self.recommend(&inbound, &text).await,
        };

        Some(to_outbound(&inbound, reply))
    }

    async fn recommend(&self, inbound: &InboundMessage, text: &str) -> Reply {
        match self.recommender.recommend(text).await {
            Ok(rec) => rec.to_reply(),
            Err(err) => {
                tracing::error!(
                    trace_id = %inbound.trace_id,
                    scope = %inbound.conversation_scope,
                    retryable = err.is_retryable(),
                    "movie catalog failed: {err}"
                );
                messages::try_again_later()
            }
        }
    }
}

pub fn spawn_session_sweeper(
    gateway: Arc<Gateway>,
    every: StdDuration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            gateway.evict_idle_sessions().await;
        }
    })
}

fn to_outbound(inbound: &InboundMessage, reply: Reply) -> OutboundMessage {
    OutboundMessage {
        trace_id: inbound.trace_id,
        channel_type: inbound.channel_type.clone(),
        connector_id: inbound.connector_id.clone(),
        conversation_scope: inbound.conversation_scope.clone(),
        body: reply.body,
        at: Utc::now(),
        reply_to: inbound.message_id.clone(),
        attachments: reply.attachments,
    }
}
