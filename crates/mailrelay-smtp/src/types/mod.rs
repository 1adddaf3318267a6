//! Core SMTP types.

mod extension;
mod mail;
mod reply;

pub use extension::{AuthMechanism, Extension};
pub use mail::{BodyType, MailOptions, encode_xtext};
pub use reply::{EnhancedCode, Reply, ReplyCode, Status};
