//! Messaging channel: outbound sender, inbound webhook gateway.
//!
//! The bot talks to exactly one recipient over one provider. Senders are
//! pluggable through [`traits::MessageSender`]; the gateway owns the HTTP
//! routes and forwards everything to the bot channel.

pub mod gateway;
pub mod recording;
pub mod traits;
pub mod twilio;

pub use gateway::{router, run_gateway, serve};
pub use recording::RecordingSender;
pub use traits::{InboundReply, MessageSender};
pub use twilio::TwilioWhatsApp;
