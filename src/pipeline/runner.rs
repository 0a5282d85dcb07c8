use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::observability::metrics::{
    AggregateMetrics, CategorizeMetrics, CleaningMetrics, NormalizeMetrics, RunMetrics,
    SinkMetrics, SourceMetrics,
};
use crate::pipeline::aggregate::{Aggregator, YearlySales};
use crate::pipeline::categorize::{CategorizedSale, Categorizer, DEFAULT_CATEGORY};
use crate::pipeline::cleaning::{CleanSale, Cleaner, DropReason};
use crate::pipeline::context::{RunContext, RunReport, RunState};
use crate::pipeline::normalize::{DateOutcome, NormalizedSale, Normalizer};
use crate::pipeline::source::CsvRecordSource;
use crate::sink::{batch_from_aggregates, batch_from_sales, SinkBatch, SinkWriter};
use crate::types::{RawSale, WriteMode};

/// Per-run parameters the orchestrator needs beyond the stages themselves.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub input_path: String,
    pub sale_table: String,
    pub aggregate_table: String,
    pub write_mode: WriteMode,
    /// Run the full transformation but skip the sink.
    pub dry_run: bool,
}

impl RunParams {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            input_path: config.source.path.clone(),
            sale_table: config.sink.table.clone(),
            aggregate_table: config.sink.aggregate_table.clone(),
            write_mode: config.sink.write_mode,
            dry_run: false,
        }
    }
}

/// Drives one run through the stage sequence. The runner owns the run
/// context; the stages stay pure and see only the records they transform.
pub struct PipelineRunner {
    source: CsvRecordSource,
    cleaner: Cleaner,
    normalizer: Normalizer,
    categorizer: Categorizer,
    aggregator: Aggregator,
    sink: Arc<dyn SinkWriter>,
}

impl PipelineRunner {
    pub fn new(categorizer: Categorizer, sink: Arc<dyn SinkWriter>) -> Self {
        Self {
            source: CsvRecordSource::new(),
            cleaner: Cleaner,
            normalizer: Normalizer,
            categorizer,
            aggregator: Aggregator,
            sink,
        }
    }

    /// Execute one run end to end. A fatal source or sink error moves the
    /// run to `Failed` and surfaces; row-level issues only move counters.
    pub async fn run(&self, params: &RunParams) -> Result<RunReport> {
        let mut ctx = RunContext::new();
        info!(run_id = %ctx.run_id, input = %params.input_path, "Starting pipeline run");

        let result = self.execute(&mut ctx, params).await;
        match result {
            Ok(()) => {
                ctx.finish();
                let duration_ms = ctx.duration_ms.unwrap_or(0);
                RunMetrics::record_completed(duration_ms as f64 / 1000.0);
                info!(
                    run_id = %ctx.run_id,
                    duration_ms,
                    rows_read = ctx.rows_read,
                    rows_clean = ctx.rows_clean,
                    rows_written = ctx.rows_written,
                    "Pipeline run finished"
                );
                Ok(self.report(&ctx, params))
            }
            Err(e) => {
                ctx.fail();
                RunMetrics::record_failed();
                error!(run_id = %ctx.run_id, state = ?ctx.state, "Pipeline run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn execute(&self, ctx: &mut RunContext, params: &RunParams) -> Result<()> {
        let sales = self.read(ctx, params)?;
        let clean = self.clean(ctx, sales);
        let normalized = self.normalize(ctx, clean);
        let categorized = self.categorize(ctx, normalized);
        let totals = self.aggregate(ctx, &categorized);

        if params.dry_run {
            info!(run_id = %ctx.run_id, "Dry run; skipping the sink");
            return Ok(());
        }
        self.load(ctx, params, &categorized, &totals).await
    }

    fn read(&self, ctx: &mut RunContext, params: &RunParams) -> Result<Vec<RawSale>> {
        ctx.enter(RunState::Reading);
        let started = Instant::now();
        let batch = match self.source.read(&params.input_path) {
            Ok(batch) => batch,
            Err(e) => {
                SourceMetrics::record_read_error();
                return Err(e);
            }
        };

        ctx.rows_read = batch.rows.len() as u64;
        ctx.malformed_cells = batch.malformed_cells;
        SourceMetrics::record_read_success(
            ctx.rows_read,
            ctx.malformed_cells,
            started.elapsed().as_secs_f64(),
        );
        Ok(batch.rows)
    }

    fn clean(&self, ctx: &mut RunContext, rows: Vec<RawSale>) -> Vec<CleanSale> {
        ctx.enter(RunState::Cleaning);
        let mut clean = Vec::with_capacity(rows.len());
        for row in rows {
            match self.cleaner.clean(row) {
                Ok(sale) => clean.push(sale),
                Err(DropReason::MissingRequired) => ctx.rows_dropped_missing += 1,
                Err(DropReason::OutOfRange) => ctx.rows_dropped_out_of_range += 1,
            }
        }

        ctx.rows_clean = clean.len() as u64;
        CleaningMetrics::record_accepted(ctx.rows_clean);
        CleaningMetrics::record_dropped_missing(ctx.rows_dropped_missing);
        CleaningMetrics::record_dropped_out_of_range(ctx.rows_dropped_out_of_range);
        info!(
            run_id = %ctx.run_id,
            accepted = ctx.rows_clean,
            dropped_missing = ctx.rows_dropped_missing,
            dropped_out_of_range = ctx.rows_dropped_out_of_range,
            "Cleaning stage done"
        );
        clean
    }

    fn normalize(&self, ctx: &mut RunContext, rows: Vec<CleanSale>) -> Vec<NormalizedSale> {
        ctx.enter(RunState::Normalizing);
        let mut parsed = 0u64;
        let mut missing = 0u64;
        let mut normalized = Vec::with_capacity(rows.len());
        for row in rows {
            let (sale, outcome) = self.normalizer.normalize(row);
            match outcome {
                DateOutcome::Parsed => parsed += 1,
                DateOutcome::Missing => missing += 1,
                DateOutcome::Unparseable => ctx.dates_unparseable += 1,
            }
            normalized.push(sale);
        }

        NormalizeMetrics::record_parsed(parsed);
        NormalizeMetrics::record_missing(missing);
        NormalizeMetrics::record_parse_warnings(ctx.dates_unparseable);
        if ctx.dates_unparseable > 0 {
            warn!(
                run_id = %ctx.run_id,
                count = ctx.dates_unparseable,
                "Sale dates failed to parse; records kept with null dates"
            );
        }
        normalized
    }

    fn categorize(&self, ctx: &mut RunContext, rows: Vec<NormalizedSale>) -> Vec<CategorizedSale> {
        ctx.enter(RunState::Categorizing);
        let categorized: Vec<CategorizedSale> = rows
            .into_iter()
            .map(|row| self.categorizer.categorize(row))
            .collect();

        let defaulted = categorized
            .iter()
            .filter(|sale| sale.property_category == DEFAULT_CATEGORY)
            .count() as u64;
        CategorizeMetrics::record_labeled(categorized.len() as u64, defaulted);
        categorized
    }

    fn aggregate(&self, ctx: &mut RunContext, rows: &[CategorizedSale]) -> Vec<YearlySales> {
        ctx.enter(RunState::Aggregating);
        let totals = self.aggregator.aggregate(rows);
        ctx.aggregate_groups = totals.len() as u64;
        AggregateMetrics::record_groups(ctx.aggregate_groups);
        totals
    }

    async fn load(
        &self,
        ctx: &mut RunContext,
        params: &RunParams,
        sales: &[CategorizedSale],
        totals: &[YearlySales],
    ) -> Result<()> {
        ctx.enter(RunState::Loading);

        let sale_batch = batch_from_sales(sales);
        ctx.rows_written += self
            .write(&params.sale_table, &sale_batch, params.write_mode)
            .await?;

        let aggregate_batch = batch_from_aggregates(totals);
        ctx.rows_written += self
            .write(&params.aggregate_table, &aggregate_batch, params.write_mode)
            .await?;

        Ok(())
    }

    async fn write(&self, table: &str, batch: &SinkBatch, mode: WriteMode) -> Result<u64> {
        let started = Instant::now();
        match self.sink.write(table, batch, mode).await {
            Ok(written) => {
                SinkMetrics::record_write_success(written, started.elapsed().as_secs_f64());
                Ok(written)
            }
            Err(e) => {
                SinkMetrics::record_write_error();
                Err(e)
            }
        }
    }

    fn report(&self, ctx: &RunContext, params: &RunParams) -> RunReport {
        RunReport::from_context(
            ctx,
            &params.sale_table,
            &params.aggregate_table,
            &params.write_mode.to_string(),
            params.dry_run,
        )
    }
}
