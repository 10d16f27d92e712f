use camino::Utf8PathBuf;

use crate::client::{PunchTransport, build_request_url};
use crate::domain::Punch;
use crate::error::RocError;
use crate::log::LogSink;
use crate::output::RawSplitsWriter;
use crate::parser::{ParsedRow, parse_payload};
use crate::store::PunchStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub api_url: String,
    pub race: u32,
    /// Send `lastId` and track the cursor.
    pub use_cursor: bool,
    /// Cursor a new session starts from.
    pub initial_cursor: i64,
    pub output_path: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingResponse,
}

/// Ticket for one in-flight fetch. Consumed by [`FetchController::complete_cycle`].
#[derive(Debug)]
pub struct CycleRequest {
    url: String,
    session: u64,
}

impl CycleRequest {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug)]
pub struct CycleSummary {
    pub url: String,
    pub transport_error: Option<RocError>,
    /// Response belonged to a session that was reset while it was in flight.
    pub discarded: bool,
    pub line_count: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Newly inserted punches that reached the output file.
    pub written: usize,
    pub store_size: usize,
    pub cursor: i64,
    pub flush_error: Option<RocError>,
}

impl CycleSummary {
    fn new(url: String) -> Self {
        Self {
            url,
            transport_error: None,
            discarded: false,
            line_count: 0,
            accepted: 0,
            rejected: 0,
            written: 0,
            store_size: 0,
            cursor: 0,
            flush_error: None,
        }
    }
}

/// Receives the controller's outbound events.
pub trait CycleObserver {
    fn new_punch_accepted(&self, _punch: &Punch) {}
    fn cycle_complete(&self, summary: &CycleSummary);
}

/// Request, ingest, deduplicate and flush, one cycle at a time.
pub struct FetchController<L: LogSink> {
    settings: ControllerSettings,
    store: PunchStore,
    state: ControllerState,
    session: u64,
    last_response: String,
    log: L,
    observers: Vec<Box<dyn CycleObserver>>,
}

impl<L: LogSink> FetchController<L> {
    pub fn new(settings: ControllerSettings, log: L) -> Self {
        let store = PunchStore::with_cursor(settings.initial_cursor);
        Self {
            settings,
            store,
            state: ControllerState::Idle,
            session: 0,
            last_response: String::new(),
            log,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn CycleObserver>) {
        self.observers.push(observer);
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn store(&self) -> &PunchStore {
        &self.store
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn cursor(&self) -> i64 {
        self.store.cursor()
    }

    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Drops every punch collected so far and starts a new session.
    pub fn reset_session(&mut self) {
        self.session += 1;
        self.store = PunchStore::with_cursor(self.settings.initial_cursor);
        self.state = ControllerState::Idle;
        self.last_response.clear();
    }

    /// Idle -> AwaitingResponse. `None` while a fetch is still outstanding.
    pub fn begin_cycle(&mut self) -> Option<CycleRequest> {
        if self.state == ControllerState::AwaitingResponse {
            self.log
                .append_line("Previous download still in progress - tick skipped");
            return None;
        }
        let cursor = self.settings.use_cursor.then(|| self.store.cursor());
        let url = build_request_url(&self.settings.api_url, self.settings.race, cursor);
        self.log.append_line(&url);
        self.state = ControllerState::AwaitingResponse;
        Some(CycleRequest {
            url,
            session: self.session,
        })
    }

    /// AwaitingResponse -> Idle. Always fires `cycle_complete` exactly once.
    pub fn complete_cycle(
        &mut self,
        request: CycleRequest,
        result: Result<Vec<u8>, RocError>,
    ) -> CycleSummary {
        let mut summary = CycleSummary::new(request.url);

        if request.session != self.session {
            self.log
                .append_line("Discarding response from a previous session");
            summary.discarded = true;
            summary.transport_error = result.err();
            self.finish(&mut summary);
            return summary;
        }
        self.state = ControllerState::Idle;

        self.last_response.clear();
        match result {
            Ok(bytes) => self.last_response = String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                self.log.append_line(&format!("Download Error : {err}"));
                summary.transport_error = Some(err);
            }
        }

        if self.last_response.is_empty() {
            self.log.append_line("Parse data - no new data");
            self.finish(&mut summary);
            return summary;
        }

        self.ingest(&mut summary);
        self.flush(&mut summary);
        self.finish(&mut summary);
        summary
    }

    /// Runs one full cycle synchronously against `transport`.
    pub fn run_cycle(&mut self, transport: &dyn PunchTransport) -> Option<CycleSummary> {
        let request = self.begin_cycle()?;
        let result = transport.fetch(request.url());
        Some(self.complete_cycle(request, result))
    }

    fn ingest(&mut self, summary: &mut CycleSummary) {
        let outcome = parse_payload(&self.last_response);
        self.log.append_line(&format!(
            "Parse data Beg - lines {}, data size {}",
            outcome.line_count,
            self.last_response.len()
        ));
        summary.line_count = outcome.line_count;

        for row in outcome.rows {
            let id = row.id();
            match row {
                ParsedRow::Accepted(punch) => {
                    if self.store.insert_if_absent(punch.clone()) {
                        summary.accepted += 1;
                        self.log.append_line(&format!("Add punch {punch}"));
                        for observer in &self.observers {
                            observer.new_punch_accepted(&punch);
                        }
                    }
                }
                ParsedRow::Rejected { diagnostic, .. } => {
                    summary.rejected += 1;
                    self.log.append_line(&diagnostic);
                }
            }
            if self.settings.use_cursor {
                self.store.maybe_advance_cursor(id);
            }
        }

        self.log.append_line(&format!(
            "Parse data End - parsed punches {}, lastId {}, stored data size {}",
            summary.accepted,
            self.store.cursor(),
            self.store.len()
        ));
    }

    fn flush(&mut self, summary: &mut CycleSummary) {
        let pending = self.store.take_pending_writes();
        if pending == 0 {
            return;
        }
        let text = RawSplitsWriter::serialize(&self.store.snapshot());
        match RawSplitsWriter::write(&self.settings.output_path, &text) {
            Ok(()) => {
                summary.written = pending;
                self.log.append_line(&format!(
                    "Txt Saved - {} items (new {} items)",
                    self.store.len(),
                    pending
                ));
            }
            Err(err) => {
                self.store.requeue_pending(pending);
                self.log.append_line(&format!("Txt Save failed - {err}"));
                summary.flush_error = Some(err);
            }
        }
    }

    fn finish(&self, summary: &mut CycleSummary) {
        summary.store_size = self.store.len();
        summary.cursor = self.store.cursor();
        for observer in &self.observers {
            observer.cycle_complete(summary);
        }
    }
}
