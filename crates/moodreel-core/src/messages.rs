//! User-facing reply texts.

use moodreel_catalog::MovieResult;
use moodreel_schema::{plain_text, Attachment, Span};

/// Telegram rejects photo captions longer than this many UTF-16 code units,
/// counted after markup is parsed.
pub const MAX_CAPTION_UTF16: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub body: Vec<Span>,
    pub attachments: Vec<Attachment>,
}

impl Reply {
    pub fn text(spans: Vec<Span>) -> Self {
        Self {
            body: spans,
            attachments: vec![],
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::text(vec![Span::plain(text)])
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(Attachment::image(url));
        self
    }

    pub fn to_plain_text(&self) -> String {
        plain_text(&self.body)
    }
}

pub fn greeting(sender_name: Option<&str>, acceptance_token: &str) -> Reply {
    let hello = match sender_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi, {name}! 👋\n"),
        None => "Hi! 👋\n".to_string(),
    };
    let mut body = vec![
        Span::plain(hello),
        Span::plain("I'm "),
        Span::bold("moodreel"),
        Span::plain(", a movie finder for your mood 🎬\n"),
        Span::plain("Before we start, please read and accept the terms of use. 📜\n\n"),
    ];
    body.extend(terms(acceptance_token));
    Reply::text(body)
}

fn terms(acceptance_token: &str) -> Vec<Span> {
    vec![
        Span::bold("🔹 Terms of use 🔹"),
        Span::plain(
            "\n\n1️⃣ This bot recommends movies based on what you tell it.\n\
             2️⃣ Information comes from public databases and may not be 100% accurate.\n\
             3️⃣ By using this bot you agree that it is for entertainment only.\n\n\
             ✅ If you agree, type ",
        ),
        Span::bold(format!("\"{}\"", display_token(acceptance_token))),
        Span::plain(" to continue."),
    ]
}

pub fn accept_reminder(acceptance_token: &str) -> Reply {
    Reply::text(vec![
        Span::plain("Please type "),
        Span::bold(format!("\"{}\"", display_token(acceptance_token))),
        Span::plain(" to continue, or use /start to begin again."),
    ])
}

pub fn mood_prompt() -> Reply {
    Reply::plain("Great! Now tell me how you're feeling or what kind of movie you want to watch. 🎥")
}

pub fn start_hint() -> Reply {
    Reply::plain("Send /start to begin.")
}

pub fn no_match_guidance() -> Reply {
    Reply::plain("Tell me your mood and a movie genre! For example: \"I'm sad, I want a romance movie\".")
}

pub fn genre_not_found(genre: &str) -> Reply {
    Reply::plain(format!("Sorry, I don't know the genre \"{genre}\" yet. 😕"))
}

pub fn no_movie_found() -> Reply {
    Reply::plain("I couldn't find a suitable movie. 😕")
}

pub fn try_again_later() -> Reply {
    Reply::plain("The movie catalog is not answering right now. Please try again later. 🙏")
}

/// `🎬 *title*` followed by the synopsis; the poster, when present, rides
/// along as an image and the synopsis is shortened to fit a caption.
pub fn recommendation(movie: &MovieResult) -> Reply {
    let head = "🎬 ";
    let sep = "\n\n📖 ";
    let synopsis = if movie.poster_url.is_some() {
        let used = utf16_len(head) + utf16_len(&movie.title) + utf16_len(sep);
        truncate_utf16(&movie.synopsis, MAX_CAPTION_UTF16.saturating_sub(used))
    } else {
        movie.synopsis.clone()
    };

    let reply = Reply::text(vec![
        Span::plain(head),
        Span::bold(movie.title.clone()),
        Span::plain(sep),
        Span::plain(synopsis),
    ]);
    match &movie.poster_url {
        Some(url) => reply.with_image(url.clone()),
        None => reply,
    }
}

fn display_token(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Cut `text` to at most `max` UTF-16 units, ending in `…` when shortened.
/// Never splits a character.
fn truncate_utf16(text: &str, max: usize) -> String {
    if utf16_len(text) <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let budget = max - '…'.len_utf16();
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        used += ch.len_utf16();
        if used > budget {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}
