use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one pipeline run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Reading,
    Cleaning,
    Normalizing,
    Categorizing,
    Aggregating,
    Loading,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Everything one run carries: its identity, where it is in the lifecycle,
/// and the counters each stage reports. Owned by the runner; the stages
/// themselves stay pure.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub rows_read: u64,
    pub malformed_cells: u64,
    pub rows_dropped_missing: u64,
    pub rows_dropped_out_of_range: u64,
    pub rows_clean: u64,
    pub dates_unparseable: u64,
    pub aggregate_groups: u64,
    pub rows_written: u64,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            rows_read: 0,
            malformed_cells: 0,
            rows_dropped_missing: 0,
            rows_dropped_out_of_range: 0,
            rows_clean: 0,
            dates_unparseable: 0,
            aggregate_groups: 0,
            rows_written: 0,
        }
    }

    /// Move the run into a stage. Once the run is terminal the state
    /// stays put.
    pub fn enter(&mut self, state: RunState) {
        if self.state.is_terminal() {
            return;
        }
        debug!(run_id = %self.run_id, from = ?self.state, to = ?state, "Run state change");
        self.state = state;
    }

    pub fn finish(&mut self) {
        self.close(RunState::Done);
    }

    pub fn fail(&mut self) {
        self.close(RunState::Failed);
    }

    fn close(&mut self, state: RunState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        let finished = Utc::now();
        self.finished_at = Some(finished);
        let elapsed = finished.signed_duration_since(self.started_at);
        self.duration_ms = Some(elapsed.num_milliseconds().max(0) as u64);
    }

    /// Rows the cleaner rejected, across both reasons.
    pub fn rows_dropped(&self) -> u64 {
        self.rows_dropped_missing + self.rows_dropped_out_of_range
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished run, emitted exactly once at run end.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub duration_ms: u64,
    pub rows_read: u64,
    pub malformed_cells: u64,
    pub rows_dropped_missing: u64,
    pub rows_dropped_out_of_range: u64,
    pub rows_clean: u64,
    pub dates_unparseable: u64,
    pub aggregate_groups: u64,
    pub rows_written: u64,
    pub sale_table: String,
    pub aggregate_table: String,
    pub write_mode: String,
    pub dry_run: bool,
}

impl RunReport {
    pub fn from_context(
        ctx: &RunContext,
        sale_table: &str,
        aggregate_table: &str,
        write_mode: &str,
        dry_run: bool,
    ) -> Self {
        Self {
            run_id: ctx.run_id,
            state: ctx.state,
            duration_ms: ctx.duration_ms.unwrap_or(0),
            rows_read: ctx.rows_read,
            malformed_cells: ctx.malformed_cells,
            rows_dropped_missing: ctx.rows_dropped_missing,
            rows_dropped_out_of_range: ctx.rows_dropped_out_of_range,
            rows_clean: ctx.rows_clean,
            dates_unparseable: ctx.dates_unparseable,
            aggregate_groups: ctx.aggregate_groups,
            rows_written: ctx.rows_written,
            sale_table: sale_table.to_string(),
            aggregate_table: aggregate_table.to_string(),
            write_mode: write_mode.to_string(),
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_idle() {
        let ctx = RunContext::new();
        assert_eq!(ctx.state, RunState::Idle);
        assert_eq!(ctx.finished_at, None);
        assert_eq!(ctx.rows_read, 0);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunContext::new().run_id, RunContext::new().run_id);
    }

    #[test]
    fn test_enter_moves_through_stages() {
        let mut ctx = RunContext::new();
        ctx.enter(RunState::Reading);
        assert_eq!(ctx.state, RunState::Reading);
        ctx.enter(RunState::Cleaning);
        assert_eq!(ctx.state, RunState::Cleaning);
    }

    #[test]
    fn test_finish_is_terminal() {
        let mut ctx = RunContext::new();
        ctx.enter(RunState::Loading);
        ctx.finish();
        assert_eq!(ctx.state, RunState::Done);
        assert!(ctx.duration_ms.is_some());

        ctx.enter(RunState::Reading);
        assert_eq!(ctx.state, RunState::Done);
        ctx.fail();
        assert_eq!(ctx.state, RunState::Done);
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut ctx = RunContext::new();
        ctx.enter(RunState::Reading);
        ctx.fail();
        assert_eq!(ctx.state, RunState::Failed);
        assert!(ctx.finished_at.is_some());

        ctx.finish();
        assert_eq!(ctx.state, RunState::Failed);
    }

    #[test]
    fn test_dropped_total() {
        let mut ctx = RunContext::new();
        ctx.rows_dropped_missing = 3;
        ctx.rows_dropped_out_of_range = 4;
        assert_eq!(ctx.rows_dropped(), 7);
    }
}
