use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Central output broker that owns stdout for every worker.
/// Rollers, hunters and the combat responder all log concurrently, so
/// lines go through one queue and come out whole.
#[derive(Clone)]
pub struct OutputBroker {
    sender: mpsc::UnboundedSender<OutputRequest>,
}

pub enum OutputRequest {
    Message { level: OutputLevel, message: String },
    FlushSummaries(Option<oneshot::Sender<()>>),
}

/// Output levels for filtering
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum OutputLevel {
    Error,      // Always shown
    Summary,    // Level 0+ - roll status and run reports, batched
    Info,       // Level 1+ - fleet movement, repairs, pauses
    Debug,      // Level 2+
    Trace,      // Level 2+ - every request
}

impl OutputLevel {
    pub fn visible_at(self, verbosity: u8) -> bool {
        match self {
            OutputLevel::Error | OutputLevel::Summary => true,
            OutputLevel::Info => verbosity >= 1,
            OutputLevel::Debug | OutputLevel::Trace => verbosity >= 2,
        }
    }
}

struct BrokerState {
    pending_summaries: VecDeque<String>,
    last_summary_flush: Instant,
    summary_interval: Duration,
}

impl OutputBroker {
    /// Create a broker whose drain worker runs on its own OS thread, so
    /// logging works with or without a tokio runtime in scope.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("output-broker".to_string())
            .spawn(move || Self::broker_worker(receiver))
            .ok();

        Self { sender }
    }

    pub fn output(&self, level: OutputLevel, message: String) {
        if !level.visible_at(crate::verbosity::get_verbosity_level()) {
            return;
        }
        // Ignore if the drain thread is gone
        let _ = self.sender.send(OutputRequest::Message { level, message });
    }

    /// Flush batched summaries and wait until they have been printed
    pub async fn flush_summaries(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(OutputRequest::FlushSummaries(Some(done))).is_ok() {
            let _ = wait.await;
        }
    }

    fn broker_worker(mut receiver: mpsc::UnboundedReceiver<OutputRequest>) {
        let mut state = BrokerState {
            pending_summaries: VecDeque::new(),
            last_summary_flush: Instant::now(),
            summary_interval: Duration::from_secs(30),
        };

        while let Some(request) = receiver.blocking_recv() {
            match request {
                OutputRequest::Message { level, message } => {
                    Self::handle_output(&mut state, level, message);
                }
                OutputRequest::FlushSummaries(done) => {
                    Self::flush_pending_summaries(&mut state);
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                }
            }

            if state.last_summary_flush.elapsed() > state.summary_interval {
                Self::flush_pending_summaries(&mut state);
            }
        }

        Self::flush_pending_summaries(&mut state);
    }

    fn handle_output(state: &mut BrokerState, level: OutputLevel, message: String) {
        match level {
            OutputLevel::Summary => {
                state.pending_summaries.push_back(message);
                if state.pending_summaries.len() > 100 {
                    state.pending_summaries.pop_front();
                }
            }
            OutputLevel::Error => eprintln!("{}", message),
            _ => println!("{}", message),
        }
    }

    fn flush_pending_summaries(state: &mut BrokerState) {
        if !state.pending_summaries.is_empty() {
            println!("\n🏴‍☠️ === STATUS ===");
            while let Some(summary) = state.pending_summaries.pop_front() {
                println!("{}", summary);
            }
            println!("🏴‍☠️ === END STATUS ===\n");
        }
        state.last_summary_flush = Instant::now();
    }
}

impl Default for OutputBroker {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_BROKER: OnceLock<OutputBroker> = OnceLock::new();

pub fn get_output_broker() -> &'static OutputBroker {
    GLOBAL_BROKER.get_or_init(OutputBroker::new)
}

#[macro_export]
macro_rules! o_error {
    ($($arg:tt)*) => {{
        $crate::output_broker::get_output_broker()
            .output($crate::output_broker::OutputLevel::Error, format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! o_summary {
    ($($arg:tt)*) => {{
        $crate::output_broker::get_output_broker()
            .output($crate::output_broker::OutputLevel::Summary, format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! o_info {
    ($($arg:tt)*) => {{
        $crate::output_broker::get_output_broker()
            .output($crate::output_broker::OutputLevel::Info, format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! o_debug {
    ($($arg:tt)*) => {{
        $crate::output_broker::get_output_broker()
            .output($crate::output_broker::OutputLevel::Debug, format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! o_trace {
    ($($arg:tt)*) => {{
        $crate::output_broker::get_output_broker()
            .output($crate::output_broker::OutputLevel::Trace, format!($($arg)*));
    }};
}
