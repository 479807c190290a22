pub mod diff;
pub mod rope;
pub mod text_edit;

pub use diff::{diff, text_edits, ComparisonPolicy};
pub use rope::RopeExt;
pub use text_edit::EditFragment;
