//! Shared worker primitives for keyhole sessions.
//!
//! * [`TaskClass`]: scheduling/observability class attached to spawned work
//! * [`spawn`]: runtime-aware task spawning
//! * [`Mailbox`]: bounded FIFO queue with an explicit overflow policy
//! * [`panic_message`]: readable text from a caught panic payload

mod class;
pub mod mailbox;
mod panic;
mod spawn;

pub use class::TaskClass;
pub use mailbox::{Mailbox, MailboxPolicy, MailboxReceiver, MailboxSendError, MailboxSendOutcome, MailboxSender};
pub use panic::{join_error_panic_message, panic_message};
pub use spawn::spawn;
