pub mod config;
pub mod conversation;
pub mod genre;
pub mod messages;
pub mod recommend;
pub mod session;

pub use config::*;
pub use conversation::{parse_input, transition, Action, ConversationState, Input, Transition};
pub use genre::{GenreEntry, GenreTable, MoodResolver, MoodRule, Resolution};
pub use messages::Reply;
pub use recommend::{Recommendation, Recommender};
pub use session::{Session, SessionStore};
