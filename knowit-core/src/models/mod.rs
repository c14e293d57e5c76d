pub mod language;
pub mod message;
pub mod upload;

pub use language::Language;
pub use message::{Message, Origin, Transcript};
pub use upload::UploadedDocument;
