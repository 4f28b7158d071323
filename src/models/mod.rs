mod article;
mod highlight;
mod reading;

pub use article::{Article, NodeSpec};
pub use highlight::{Highlight, HighlightColor};
pub use reading::{Progress, Stats};
