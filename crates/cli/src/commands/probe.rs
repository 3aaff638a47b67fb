//! Probe commands - run one transaction and summarise it

use anyhow::{Context, Result};
use tracing::info;

use sipprobe_message::{CallContext, ProbeMode, Target};
use sipprobe_transaction::{run_transaction, TransactionOutcome};

/// Execute a probe of the given mode
pub async fn execute(mode: ProbeMode, target: Target, context: CallContext) -> Result<()> {
    info!(
        %mode,
        host = target.host(),
        port = target.port(),
        secure = target.transport().is_secure(),
        "probing"
    );

    let outcome = run_transaction(mode, &target, &context)
        .await
        .with_context(|| format!("{mode} probe of {}:{} failed", target.host(), target.port()))?;

    println!("{}", summary(&outcome));
    Ok(())
}

/// One-line report printed after the transcript
pub fn summary(outcome: &TransactionOutcome) -> String {
    let status = match outcome.status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    };
    let mut line = format!(
        "--- {} probe finished in {}: last status {}, {} line(s) received",
        outcome.mode,
        outcome.state(),
        status,
        outcome.lines_received
    );

    if outcome.mode.is_invite() {
        match (&outcome.response_tag, outcome.ack_sent) {
            (Some(tag), true) => line.push_str(&format!(", ACK sent (tag {tag})")),
            _ => line.push_str(", no ACK sent"),
        }
    }
    line
}
