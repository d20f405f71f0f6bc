//! Single-writer owner of a run's ledger and progress queue.
//!
//! Stages never share the ledger. They hold a cheap [`RecorderHandle`] and send it
//! messages; one spawned task ([`RunRecorder`]) applies them in arrival order, assigns
//! sequence numbers, and forwards progress events to the transport.
//!
//! The controller sends over an unbounded channel, so it never waits on a slow client.
//! Backpressure is absorbed inside the actor: events wait in an outbox bounded by the
//! configured capacity, and when the outbox is full the oldest non-terminal event is
//! discarded. `complete` and `error` are always kept.
//!
//! When the run ends the actor gets one last window (`flush_timeout`) to hand the queue
//! over. A client that is still connected but not reading gets no more than that: queued
//! progress is dropped, the terminal event is given up on, and the run finishes anyway.

use crate::agentverse::event::ProgressEvent;
use crate::agentverse::ledger::{Exchange, Ledger, LedgerEntry};
use log::{debug, warn};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

enum RecorderCommand {
    Record(Exchange),
    Publish(ProgressEvent),
    Snapshot(oneshot::Sender<Vec<LedgerEntry>>),
}

/// Sending side of the recorder. Clone freely; the actor stops once every handle is
/// dropped, after flushing whatever is still queued.
#[derive(Clone)]
pub struct RecorderHandle {
    run_id: String,
    tx: mpsc::UnboundedSender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append a finished exchange. The entry is also published as `llm_request`.
    pub fn record(&self, exchange: Exchange) {
        if self.tx.send(RecorderCommand::Record(exchange)).is_err() {
            warn!("agentverse::recorder: run {} recorder is gone, exchange dropped", self.run_id);
        }
    }

    pub fn publish(&self, event: ProgressEvent) {
        if self.tx.send(RecorderCommand::Publish(event)).is_err() {
            warn!("agentverse::recorder: run {} recorder is gone, event dropped", self.run_id);
        }
    }

    /// Every entry recorded so far, in sequence order.
    pub async fn snapshot(&self) -> Vec<LedgerEntry> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(RecorderCommand::Snapshot(reply_tx)).is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Drop-oldest-non-terminal buffer in front of the transport channel.
struct Outbox {
    queue: VecDeque<ProgressEvent>,
    capacity: usize,
    dropped: usize,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    fn push(&mut self, event: ProgressEvent) {
        if self.queue.len() >= self.capacity {
            match self.queue.iter().position(|e| !e.is_terminal()) {
                Some(oldest) => {
                    self.queue.remove(oldest);
                    self.dropped += 1;
                }
                None if !event.is_terminal() => {
                    self.dropped += 1;
                    return;
                }
                None => {}
            }
        }
        self.queue.push_back(event);
    }
}

/// The actor. Construct with [`RunRecorder::spawn`].
pub struct RunRecorder {
    run_id: String,
    ledger: Ledger,
    outbox: Outbox,
    sink: Option<mpsc::Sender<ProgressEvent>>,
    flush_timeout: Duration,
}

enum Step<'a> {
    Command(Option<RecorderCommand>),
    Deliver(Option<mpsc::Permit<'a, ProgressEvent>>),
}

impl RunRecorder {
    /// Start the actor for one run.
    ///
    /// `sink` receives progress events for streaming clients; pass `None` when nobody is
    /// listening and events are only logged. `capacity` bounds the internal outbox and
    /// `flush_timeout` bounds how long the final flush waits on a full `sink`.
    pub fn spawn(
        run_id: impl Into<String>,
        sink: Option<mpsc::Sender<ProgressEvent>>,
        capacity: usize,
        flush_timeout: Duration,
    ) -> (RecorderHandle, JoinHandle<()>) {
        let run_id = run_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = RunRecorder {
            run_id: run_id.clone(),
            ledger: Ledger::new(),
            outbox: Outbox::new(capacity),
            sink,
            flush_timeout,
        };
        let join = tokio::spawn(recorder.run(rx));
        (RecorderHandle { run_id, tx }, join)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RecorderCommand>) {
        loop {
            let mut sink_closed = false;
            let step = match self.sink.as_ref() {
                Some(sink) if !self.outbox.queue.is_empty() => {
                    tokio::select! {
                        command = rx.recv() => Step::Command(command),
                        permit = sink.reserve() => Step::Deliver(permit.ok()),
                    }
                }
                _ => Step::Command(rx.recv().await),
            };

            match { step } {
                Step::Command(Some(command)) => {
                    Self::apply(&self.run_id, &mut self.ledger, &mut self.outbox, self.sink.is_some(), command)
                }
                Step::Command(None) => break,
                Step::Deliver(Some(permit)) => {
                    if let Some(event) = self.outbox.queue.pop_front() {
                        permit.send(event);
                    }
                }
                Step::Deliver(None) => sink_closed = true,
            }

            if sink_closed {
                debug!("agentverse::recorder: run {} progress receiver closed", self.run_id);
                self.sink = None;
                self.outbox.queue.clear();
            }
        }

        self.flush().await;
    }

    fn apply(run_id: &str, ledger: &mut Ledger, outbox: &mut Outbox, listening: bool, command: RecorderCommand) {
        match command {
            RecorderCommand::Record(exchange) => {
                let entry = ledger.append(exchange).clone();
                debug!(
                    "agentverse::recorder: run {} seq={} stage={} label={} source={}",
                    run_id, entry.seq, entry.exchange.stage, entry.exchange.label, entry.exchange.source
                );
                if listening {
                    outbox.push(ProgressEvent::LlmRequest(entry));
                }
            }
            RecorderCommand::Publish(event) => {
                debug!("agentverse::recorder: run {} event {}", run_id, event.name());
                if listening {
                    outbox.push(event);
                }
            }
            RecorderCommand::Snapshot(reply) => {
                let _ = reply.send(ledger.entries().to_vec());
            }
        }
    }

    fn undelivered(&mut self, terminal: bool) {
        self.outbox.dropped += 1;
        if terminal {
            warn!(
                "agentverse::recorder: run {} terminal event not delivered within {:?}",
                self.run_id, self.flush_timeout
            );
        }
    }

    async fn flush(mut self) {
        if let Some(sink) = self.sink.take() {
            let deadline = Instant::now() + self.flush_timeout;
            let mut expired = false;
            while let Some(event) = self.outbox.queue.pop_front() {
                let terminal = event.is_terminal();
                if !expired {
                    match timeout_at(deadline, sink.send(event)).await {
                        Ok(Ok(())) => continue,
                        Ok(Err(_)) => break,
                        Err(_) => {
                            expired = true;
                            self.undelivered(terminal);
                            continue;
                        }
                    }
                }
                match sink.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Closed(_)) => break,
                    Err(TrySendError::Full(_)) => self.undelivered(terminal),
                }
            }
        }
        if self.outbox.dropped > 0 {
            warn!(
                "agentverse::recorder: run {} dropped {} progress events for a slow client",
                self.run_id, self.outbox.dropped
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentverse::ledger::sample_exchange;

    fn start(n: usize) -> ProgressEvent {
        ProgressEvent::IterationStart {
            iteration: n,
            max_iterations: 5,
            message: String::new(),
        }
    }

    #[test]
    fn full_outbox_drops_oldest_non_terminal() {
        let mut outbox = Outbox::new(2);
        outbox.push(start(1));
        outbox.push(start(2));
        outbox.push(start(3));
        assert_eq!(outbox.dropped, 1);
        let kept: Vec<usize> = outbox
            .queue
            .iter()
            .map(|e| match e {
                ProgressEvent::IterationStart { iteration, .. } => *iteration,
                _ => 0,
            })
            .collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[tokio::test]
    async fn concurrent_records_get_unique_increasing_seq() {
        let (handle, join) = RunRecorder::spawn("run-1", None, 8, Duration::from_secs(1));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                h.record(sample_exchange(&format!("call-{}", i)));
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let entries = handle.snapshot().await;
        assert_eq!(entries.len(), 16);
        assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn queued_events_are_flushed_when_the_run_ends() {
        let (tx, mut rx) = mpsc::channel(1);
        let (handle, join) = RunRecorder::spawn("run-2", Some(tx), 16, Duration::from_secs(5));
        handle.publish(start(1));
        handle.record(sample_exchange("x"));
        handle.publish(start(2));
        drop(handle);

        let collector = tokio::spawn(async move {
            let mut names = Vec::new();
            while let Some(event) = rx.recv().await {
                names.push(event.name());
            }
            names
        });
        join.await.unwrap();
        let names = collector.await.unwrap();
        assert_eq!(names, vec!["iteration_start", "llm_request", "iteration_start"]);
    }

    #[tokio::test]
    async fn unread_receiver_does_not_hold_the_recorder() {
        let (tx, mut rx) = mpsc::channel(2);
        let (handle, join) = RunRecorder::spawn("run-3", Some(tx), 16, Duration::from_millis(100));
        for n in 1..=6 {
            handle.publish(start(n));
        }
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("recorder finished without the receiver being read")
            .unwrap();

        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            names.push(event.name());
        }
        assert_eq!(names, vec!["iteration_start", "iteration_start"]);
    }
}
