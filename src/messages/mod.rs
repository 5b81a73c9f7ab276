pub mod attachment;
pub mod storage;
pub mod types;

pub use attachment::{DataUri, InlineData};
pub use storage::Transcript;
pub use types::{AudioData, PendingTurn, Role, Source, Turn};
