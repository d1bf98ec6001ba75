use std::io::Write;
use std::path::Path;

use anyhow::Context;
use lmunit_client::{BatchClient, ClientConfig, UnitTestRequest};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::args::{ClientArgs, RunArgs};
use crate::dataset::{load_rows, UnitTestCatalog};
use crate::exit_codes::{ITEM_FAILURES, SUCCESS};
use crate::report::{extract_scores, records, summarize};

pub(crate) async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let catalog = match &args.catalog {
        Some(path) => UnitTestCatalog::load(path)?,
        None => UnitTestCatalog::reward_bench(),
    };

    let rows = load_rows(&args.input, args.format, args.mode, &catalog, args.limit)?;
    info!(rows = rows.len(), input = %args.input.display(), "loaded requests");

    let config = client_config(ClientConfig::from_env(), &args.client);
    let mut client = BatchClient::new(config).context("invalid client configuration")?;

    let requests: Vec<UnitTestRequest> = rows.iter().map(|r| r.request.clone()).collect();
    let outcomes = client.run_batch(&requests).await?;

    for (index, outcome) in outcomes.iter().enumerate() {
        match &outcome.result {
            Ok(payload) => info!(
                request = index + 1,
                attempts = outcome.attempts,
                result = %payload.as_value(),
                "request succeeded"
            ),
            Err(e) => warn!(
                request = index + 1,
                attempts = outcome.attempts,
                error = %e,
                "request failed"
            ),
        }
    }

    let scores = extract_scores(&outcomes);
    let summary = summarize(&rows, &outcomes, &scores);

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        mean_score = summary.mean_score,
        "evaluation finished"
    );
    for (subset, stats) in &summary.subsets {
        info!(subset = %subset, count = stats.count, mean_score = stats.mean_score, "subset score");
    }

    let document = json!({
        "summary": summary,
        "results": records(&rows, &outcomes),
    });
    write_output(args.output.as_deref(), &document)?;

    Ok(if summary.has_failures() {
        ITEM_FAILURES
    } else {
        SUCCESS
    })
}

/// Flags (already merged with their env vars by clap) override `base`.
fn client_config(base: ClientConfig, args: &ClientArgs) -> ClientConfig {
    let mut config = base;
    if let Some(url) = &args.url {
        config = config.with_url(url.clone());
    }
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    if let Some(rate) = args.rate_limit {
        config = config.with_rate_limit(rate);
    }
    if let Some(retries) = args.max_retries {
        config = config.with_max_retries(retries);
    }
    // Raw seconds; out-of-range values are rejected by `ClientConfig::validate`.
    if let Some(delay) = args.base_delay {
        config.base_delay_secs = delay;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(deadline) = args.batch_deadline {
        config.batch_deadline_secs = Some(deadline);
    }
    config
}

fn write_output(path: Option<&Path>, document: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(document)?;
    match path {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text)?;
        }
    }
    Ok(())
}
