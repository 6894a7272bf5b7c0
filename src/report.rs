//! Human-readable output for the CLI.

use std::fmt::Write;

use crate::{
    datetime::parse_storage,
    error::AppResult,
    ingest::{EnrichStats, RunReport, SourceOutcome},
    store::Store,
};

pub fn render_run(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sources");
    for source in &report.sources {
        let stats = source.outcome.stats();
        let status = match &source.outcome {
            SourceOutcome::Completed(_) => "ok".to_string(),
            SourceOutcome::PartialFailure { error, .. } if source.optional => format!("skipped ({error})"),
            SourceOutcome::PartialFailure { error, .. } => format!("FAILED ({error})"),
        };
        let _ = writeln!(
            out,
            "  {:<40} {:>4} found  {:>4} new  {:>4} dup  {:>3} enriched  {}",
            source.name, stats.candidates, stats.new_screenings, stats.duplicates, stats.enriched, status
        );
    }

    let totals = report.totals();
    let _ = writeln!(
        out,
        "Total: {} screenings found, {} new, {} already stored, {} new movies ({} enriched), {} items failed",
        totals.candidates,
        totals.new_screenings,
        totals.duplicates,
        totals.new_movies,
        totals.enriched,
        totals.failed_items
    );
    let failed: Vec<&str> = report.required_failures().map(|r| r.name.as_str()).collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "Failed sources: {}", failed.join(", "));
    }
    out
}

pub fn render_enrichment(stats: &EnrichStats) -> String {
    format!(
        "Enrichment: {} considered, {} enriched, {} already complete\n",
        stats.considered, stats.enriched, stats.skipped
    )
}

/// Database counts followed by the next `limit` screenings at every theater.
pub async fn render_summary(store: &Store, limit: u64) -> AppResult<String> {
    let counts = store.counts().await?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Database: {} theaters, {} movies, {} screenings",
        counts.theaters, counts.movies, counts.screenings
    );

    for theater in store.theaters().await? {
        let upcoming = store.upcoming(theater.id, limit).await?;
        let _ = writeln!(out, "\n{}", theater.name);
        if upcoming.is_empty() {
            let _ = writeln!(out, "  (nothing upcoming)");
        }
        for (screening, movie) in upcoming {
            let when = parse_storage(&screening.screening_datetime)
                .map(|dt| dt.strftime("%a %b %d %H:%M").to_string())
                .unwrap_or_else(|| screening.screening_datetime.clone());
            let title = movie.map(|m| m.title).unwrap_or_else(|| "?".to_string());
            let format = screening.format.as_deref().unwrap_or("");
            let _ = writeln!(out, "  {when}  {title}  {format}");
        }
    }
    Ok(out)
}
