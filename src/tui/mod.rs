mod handler;
mod ui;

pub use handler::{handle_key_event, handle_mouse_event, AppAction, InputMode};
pub use ui::{article_viewport, draw};
