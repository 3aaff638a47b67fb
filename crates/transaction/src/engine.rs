//! The probe transaction engine
//!
//! Drives one exchange from start to finish:
//!
//! ```text
//! INVITE:  Idle -> Connected -> RequestSent -> AwaitingFinal
//!               -> DialogEstablished -> AckSent -> Closed
//! OPTIONS: Idle -> Connected -> RequestSent -> OptionsAwaitingResponse -> Closed
//! ```
//!
//! A peer that closes the stream early moves `AwaitingFinal` straight to
//! `Closed` without an ACK. Any error aborts the exchange; the connection is
//! closed on every path once it has been opened.

use tracing::{debug, info, warn};

use sipprobe_message::parser::trim_line_terminator;
use sipprobe_message::{
    builder, parse_response_line, random_media_port, CallContext, ProbeMode, RenderedMessage,
    ResponseLine, Target,
};
use sipprobe_transport::{Connection, Connector, TransportSelector};

use crate::error::{Result, TransactionError};
use crate::state::{DialogState, Progress, TransactionState};
use crate::transcript::{StdoutTranscript, Transcript};

/// What a completed transaction did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub mode: ProbeMode,
    /// Every state visited, in order, ending with `Closed`
    pub states: Vec<TransactionState>,
    /// Status code of the last response line seen
    pub status: Option<u16>,
    /// To tag of the acknowledged 200 OK
    pub response_tag: Option<String>,
    pub ack_sent: bool,
    pub lines_received: usize,
}

impl TransactionOutcome {
    fn new(mode: ProbeMode) -> Self {
        Self {
            mode,
            states: vec![TransactionState::Idle],
            status: None,
            response_tag: None,
            ack_sent: false,
            lines_received: 0,
        }
    }

    /// The state the transaction finished in
    pub fn state(&self) -> TransactionState {
        self.states
            .last()
            .copied()
            .unwrap_or(TransactionState::Idle)
    }

    pub fn visited(&self, state: TransactionState) -> bool {
        self.states.contains(&state)
    }

    fn transition(&mut self, next: TransactionState) {
        debug!(from = %self.state(), to = %next, "transaction state change");
        self.states.push(next);
    }
}

/// Runs probe transactions over connections from `C`, echoing to `T`
pub struct TransactionEngine<C = TransportSelector, T = StdoutTranscript> {
    connector: C,
    transcript: T,
}

impl TransactionEngine {
    /// Engine using real sockets and echoing to stdout
    pub fn new() -> Self {
        Self::with_parts(TransportSelector, StdoutTranscript)
    }
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector, T: Transcript> TransactionEngine<C, T> {
    pub fn with_parts(connector: C, transcript: T) -> Self {
        Self {
            connector,
            transcript,
        }
    }

    pub fn transcript(&self) -> &T {
        &self.transcript
    }

    /// Run one transaction.
    ///
    /// The request is rendered before connecting, so an unusable target
    /// fails without touching the network.
    pub async fn run(
        &mut self,
        mode: ProbeMode,
        target: &Target,
        context: &CallContext,
    ) -> Result<TransactionOutcome> {
        let request = render_request(mode, target, context)?;
        let mut outcome = TransactionOutcome::new(mode);

        info!(
            %mode,
            host = target.host(),
            port = target.port(),
            call_id = context.call_id(),
            "starting transaction"
        );

        let mut connection = match self.connector.open(target).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, "could not open connection, nothing sent");
                return Err(e.into());
            }
        };
        outcome.transition(TransactionState::Connected);

        let result = self
            .exchange(&mut connection, &request, target, context, &mut outcome)
            .await;

        if let Err(e) = connection.close().await {
            warn!(error = %e, "failed to close connection cleanly");
        }
        outcome.transition(TransactionState::Closed);

        match &result {
            Ok(()) => info!(
                status = ?outcome.status,
                ack_sent = outcome.ack_sent,
                "transaction complete"
            ),
            Err(e) => warn!(error = %e, "transaction aborted"),
        }
        result.map(|()| outcome)
    }

    async fn exchange(
        &mut self,
        connection: &mut Connection,
        request: &RenderedMessage,
        target: &Target,
        context: &CallContext,
        outcome: &mut TransactionOutcome,
    ) -> Result<()> {
        self.send(connection, request).await?;
        outcome.transition(TransactionState::RequestSent);

        if outcome.mode.is_invite() {
            self.await_final(connection, target, context, outcome).await
        } else {
            self.await_options_response(connection, outcome).await
        }
    }

    async fn send(&mut self, connection: &mut Connection, message: &RenderedMessage) -> Result<()> {
        connection.send(message.as_bytes()).await?;
        self.transcript.sent(message);
        debug!(method = %message.method(), bytes = message.len(), "request written");
        Ok(())
    }

    /// Read INVITE responses until the 200 OK body is complete or the peer closes.
    async fn await_final(
        &mut self,
        connection: &mut Connection,
        target: &Target,
        context: &CallContext,
        outcome: &mut TransactionOutcome,
    ) -> Result<()> {
        outcome.transition(TransactionState::AwaitingFinal);
        let mut dialog = DialogState::new();

        loop {
            let chunk = match dialog.body_remaining() {
                Some(remaining) => connection.read_line_bounded(remaining).await?,
                None => connection.read_line().await?,
            };
            let Some(raw) = chunk else {
                debug!(ok_received = dialog.ok_received(), "stream ended before dialog was established");
                break;
            };

            outcome.lines_received += 1;
            let text = String::from_utf8_lossy(&raw);
            self.transcript.received(trim_line_terminator(&text));

            let progress = dialog.observe(&raw)?;
            outcome.status = dialog.last_status();

            if progress == Progress::Established {
                outcome.transition(TransactionState::DialogEstablished);
                let tag = dialog
                    .response_tag()
                    .ok_or_else(|| TransactionError::malformed("SIP/2.0 200 OK", "response carried no To tag"))?
                    .to_string();

                let ack = builder::ack(target, context, &tag)?;
                self.send(connection, &ack).await?;
                dialog.mark_ack_sent();

                outcome.ack_sent = true;
                outcome.response_tag = Some(tag);
                outcome.transition(TransactionState::AckSent);
                break;
            }
        }

        Ok(())
    }

    /// Echo the OPTIONS response up to its blank line or the end of the stream.
    async fn await_options_response(
        &mut self,
        connection: &mut Connection,
        outcome: &mut TransactionOutcome,
    ) -> Result<()> {
        outcome.transition(TransactionState::OptionsAwaitingResponse);

        while let Some(raw) = connection.read_line().await? {
            outcome.lines_received += 1;
            let text = String::from_utf8_lossy(&raw);
            let line = trim_line_terminator(&text);
            if line.is_empty() {
                break;
            }
            self.transcript.received(line);

            if let Ok(ResponseLine::Status(status)) = parse_response_line(line) {
                outcome.status = Some(status.code);
            }
        }

        Ok(())
    }
}

fn render_request(mode: ProbeMode, target: &Target, context: &CallContext) -> Result<RenderedMessage> {
    let request = match mode {
        ProbeMode::EarlyOffer => builder::early_offer_invite(target, context, random_media_port())?,
        ProbeMode::DelayedOffer => builder::delayed_offer_invite(target, context)?,
        ProbeMode::Options => builder::options(target, context),
    };
    Ok(request)
}

/// Run one transaction with real sockets, echoing to stdout
pub async fn run_transaction(
    mode: ProbeMode,
    target: &Target,
    context: &CallContext,
) -> Result<TransactionOutcome> {
    TransactionEngine::new().run(mode, target, context).await
}
