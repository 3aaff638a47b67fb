//! Single-shot SIP transaction engine
//!
//! Sends one early-offer INVITE, delayed-offer INVITE or OPTIONS to a target,
//! reads the response stream line by line and, for INVITEs, acknowledges the
//! 200 OK once its body has fully arrived. One transaction owns one
//! connection and one [`DialogState`]; nothing is shared between runs.
//!
//! ```no_run
//! use sipprobe_message::{CallContext, ProbeMode, Target};
//! use sipprobe_transaction::run_transaction;
//!
//! # async fn probe() -> sipprobe_transaction::Result<()> {
//! let target = Target::new("192.0.2.10").with_user("1").with_domain("192.0.2.10");
//! let context = CallContext::new("192.0.2.55");
//!
//! let outcome = run_transaction(ProbeMode::EarlyOffer, &target, &context).await?;
//! println!("ACK sent: {}", outcome.ack_sent);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod state;
pub mod transcript;

pub use engine::{run_transaction, TransactionEngine, TransactionOutcome};
pub use error::{Result, TransactionError};
pub use state::{DialogState, Progress, TransactionState};
pub use transcript::{StdoutTranscript, Transcript};
