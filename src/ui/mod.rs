//! Terminal UI for crewloop.
//!
//! - `chat`: [`ChatUI`] renders session events
//! - `input`: [`StdinInput`] feeds user lines to the session
//! - `icons`: shared emoji with ASCII fallbacks

pub mod chat;
pub mod icons;
pub mod input;

pub use chat::{ChatUI, print_publish_result};
pub use input::StdinInput;
