use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moodreel_gateway::Gateway;
use moodreel_schema::{InboundMessage, OutboundMessage, Span};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, Message, ParseMode};
use teloxide::utils::markdown;
use uuid::Uuid;

pub struct TelegramAdapter {
    connector_id: String,
}

impl TelegramAdapter {
    pub fn new(connector_id: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
        }
    }

    pub fn to_inbound(
        &self,
        chat_id: i64,
        user_id: i64,
        sender_name: Option<&str>,
        text: &str,
        message_id: Option<i32>,
    ) -> InboundMessage {
        InboundMessage {
            trace_id: Uuid::new_v4(),
            channel_type: "telegram".to_string(),
            connector_id: self.connector_id.clone(),
            conversation_scope: format!("chat:{chat_id}"),
            user_scope: format!("user:{user_id}"),
            text: text.to_string(),
            at: Utc::now(),
            sender_name: sender_name.map(str::to_string),
            message_id: message_id.map(|id| id.to_string()),
        }
    }
}

/// Render reply spans as Telegram MarkdownV2.
pub fn render_markdown(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Plain(text) => escape_v2(text),
            Span::Bold(text) => markdown::bold(&escape_v2(text)),
        })
        .collect()
}

/// `markdown::escape` leaves `\` alone, but MarkdownV2 treats it as the
/// escape character itself.
fn escape_v2(text: &str) -> String {
    markdown::escape(&text.replace('\\', "\\\\"))
}

pub struct TelegramBot {
    token: String,
    connector_id: String,
    gateway: Arc<Gateway>,
}

impl TelegramBot {
    pub fn new(token: String, connector_id: String, gateway: Arc<Gateway>) -> Self {
        Self {
            token,
            connector_id,
            gateway,
        }
    }

    pub async fn run_impl(self) -> anyhow::Result<()> {
        let bot = Bot::new(&self.token);
        let adapter = Arc::new(TelegramAdapter::new(&self.connector_id));
        let gateway = self.gateway;

        // The dispatcher serialises updates per chat, so one conversation's
        // messages reach the gateway in order.
        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let adapter = adapter.clone();
            let gateway = gateway.clone();

            async move {
                let text = match msg.text() {
                    Some(text) => text.to_string(),
                    None => return Ok::<(), teloxide::RequestError>(()),
                };

                let chat_id = msg.chat.id;
                let user_id = msg.from.as_ref().map(|user| user.id.0 as i64).unwrap_or(0);
                let first_name = msg.from.as_ref().map(|user| user.first_name.clone());
                let inbound = adapter.to_inbound(
                    chat_id.0,
                    user_id,
                    first_name.as_deref(),
                    &text,
                    Some(msg.id.0),
                );

                // Only catalog lookups are slow enough to warrant "typing..."
                let typing_handle = if gateway.will_query_catalog(&inbound).await {
                    Some(spawn_typing(bot.clone(), chat_id).await)
                } else {
                    None
                };

                let outbound = gateway.handle_inbound(inbound).await;
                if let Some(handle) = typing_handle {
                    handle.abort();
                }

                if let Some(outbound) = outbound {
                    if let Err(err) = deliver(&bot, chat_id, &outbound).await {
                        tracing::error!(trace_id = %outbound.trace_id, "failed to send reply: {err}");
                    }
                }

                Ok::<(), teloxide::RequestError>(())
            }
        });

        tracing::info!(connector_id = %self.connector_id, "telegram bot polling");
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::ChannelBot for TelegramBot {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    fn connector_id(&self) -> &str {
        &self.connector_id
    }

    async fn run(self: Box<Self>) -> anyhow::Result<()> {
        (*self).run_impl().await
    }
}

/// Show "typing..." now and keep refreshing it until the handle is aborted.
async fn spawn_typing(bot: Bot, chat_id: ChatId) -> tokio::task::JoinHandle<()> {
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(4)).await;
            if bot
                .send_chat_action(chat_id, ChatAction::Typing)
                .await
                .is_err()
            {
                break;
            }
        }
    })
}

/// Send the poster with the reply as caption, or plain text when there is
/// no poster or Telegram refuses it.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    outbound: &OutboundMessage,
) -> Result<(), teloxide::RequestError> {
    let text = render_markdown(&outbound.body);

    if let Some(poster) = outbound.image().and_then(|image| parse_image_url(&image.url)) {
        match bot
            .send_photo(chat_id, InputFile::url(poster))
            .caption(text.clone())
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => tracing::warn!("failed to send poster, falling back to text: {err}"),
        }
    }

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

fn parse_image_url(raw: &str) -> Option<url::Url> {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            tracing::warn!("ignoring poster with unsupported scheme: {}", url.scheme());
            None
        }
        Err(err) => {
            tracing::warn!("ignoring malformed poster url {raw}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_to_inbound_sets_fields() {
        let adapter = TelegramAdapter::new("tg_main");
        let msg = adapter.to_inbound(123, 456, Some("Ana"), "hello", Some(789));
        assert_eq!(msg.channel_type, "telegram");
        assert_eq!(msg.connector_id, "tg_main");
        assert_eq!(msg.conversation_scope, "chat:123");
        assert_eq!(msg.user_scope, "user:456");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.sender_name.as_deref(), Some("Ana"));
        assert_eq!(msg.message_id, Some("789".to_string()));
    }

    #[test]
    fn adapter_to_inbound_negative_chat_id() {
        let adapter = TelegramAdapter::new("tg");
        let msg = adapter.to_inbound(-100123, 456, None, "group msg", None);
        assert_eq!(msg.conversation_scope, "chat:-100123");
        assert!(msg.sender_name.is_none());
        assert!(msg.message_id.is_none());
    }

    #[test]
    fn render_markdown_bolds_and_escapes() {
        let spans = vec![
            Span::plain("🎬 "),
            Span::bold("Heat (1995)"),
            Span::plain("\n\n📖 A heist. Cops vs. robbers!"),
        ];
        assert_eq!(
            render_markdown(&spans),
            "🎬 *Heat \\(1995\\)*\n\n📖 A heist\\. Cops vs\\. robbers\\!"
        );
    }

    #[test]
    fn render_markdown_escapes_plain_punctuation() {
        let spans = vec![Span::plain("Send /start to begin.")];
        assert_eq!(render_markdown(&spans), "Send /start to begin\\.");
    }

    #[test]
    fn render_markdown_escapes_backslashes() {
        let spans = vec![Span::plain(r"a\b. c\")];
        assert_eq!(render_markdown(&spans), r"a\\b\. c\\");
    }

    #[test]
    fn trailing_backslash_in_title_keeps_bold_closed() {
        let spans = vec![Span::plain("🎬 "), Span::bold(r"Title\")];
        let rendered = render_markdown(&spans);
        assert_eq!(rendered, r"🎬 *Title\\*");
    }

    #[test]
    fn parse_image_url_accepts_https_only() {
        assert!(parse_image_url("https://image.tmdb.org/t/p/w500/a.jpg").is_some());
        assert!(parse_image_url("ftp://example.com/a.jpg").is_none());
        assert!(parse_image_url("not a url").is_none());
    }
}
