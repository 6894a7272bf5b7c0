//! Runs sources one after another and commits their candidates idempotently.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::{
    enrich::Enricher,
    entities::movie,
    error::{AppError, AppResult},
    models::{FetchWindow, ScreeningCandidate},
    sources::{BoxedSource, Source},
    store::{InsertOutcome, Store},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SourceStats {
    pub candidates: usize,
    pub new_movies: usize,
    pub new_screenings: usize,
    pub duplicates: usize,
    pub enriched: usize,
    pub failed_items: usize,
}

impl SourceStats {
    fn absorb(&mut self, other: &SourceStats) {
        self.candidates += other.candidates;
        self.new_movies += other.new_movies;
        self.new_screenings += other.new_screenings;
        self.duplicates += other.duplicates;
        self.enriched += other.enriched;
        self.failed_items += other.failed_items;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceOutcome {
    Completed(SourceStats),
    /// The source stopped early or lost items; `stats` covers what did get committed.
    PartialFailure { error: String, stats: SourceStats },
}

impl SourceOutcome {
    pub fn stats(&self) -> &SourceStats {
        match self {
            SourceOutcome::Completed(stats) | SourceOutcome::PartialFailure { stats, .. } => stats,
        }
    }

    /// Nothing at all came back from the upstream.
    pub fn failed_outright(&self) -> bool {
        matches!(self, SourceOutcome::PartialFailure { stats, .. } if stats.candidates == 0)
    }
}

#[derive(Clone, Debug)]
pub struct SourceReport {
    pub name: String,
    pub optional: bool,
    pub outcome: SourceOutcome,
}

#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn totals(&self) -> SourceStats {
        let mut totals = SourceStats::default();
        for report in &self.sources {
            totals.absorb(report.outcome.stats());
        }
        totals
    }

    /// Required sources that produced nothing. Optional ones may fail freely.
    pub fn required_failures(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|r| !r.optional && r.outcome.failed_outright())
    }

    pub fn is_success(&self) -> bool {
        self.required_failures().next().is_none()
    }
}

/// Processes every source in order. A failing source never stops the run.
pub async fn run(
    store: &Store,
    enricher: Option<&Enricher>,
    sources: &[BoxedSource],
    window: &FetchWindow,
) -> RunReport {
    let mut report = RunReport::default();
    for source in sources {
        info!(source = %source.name(), "ingesting");
        let outcome = ingest_source(store, enricher, source.as_ref(), window).await;
        match &outcome {
            SourceOutcome::Completed(stats) => info!(
                source = %source.name(),
                candidates = stats.candidates,
                new_screenings = stats.new_screenings,
                duplicates = stats.duplicates,
                "source completed"
            ),
            SourceOutcome::PartialFailure { error, stats } => warn!(
                source = %source.name(),
                optional = source.is_optional(),
                new_screenings = stats.new_screenings,
                error = %error,
                "source failed"
            ),
        }
        report.sources.push(SourceReport {
            name: source.name().to_string(),
            optional: source.is_optional(),
            outcome,
        });
    }
    report
}

pub async fn ingest_source(
    store: &Store,
    enricher: Option<&Enricher>,
    source: &dyn Source,
    window: &FetchWindow,
) -> SourceOutcome {
    let candidates = match source.fetch_screenings(window).await {
        Ok(candidates) => candidates,
        Err(err) => {
            return SourceOutcome::PartialFailure { error: err.to_string(), stats: SourceStats::default() };
        },
    };

    let mut stats = SourceStats { candidates: candidates.len(), ..Default::default() };
    let mut theater_ids: HashMap<String, i32> = HashMap::new();
    let mut first_error: Option<AppError> = None;

    for candidate in &candidates {
        let result = async {
            let theater_id = theater_id(store, source, &mut theater_ids, candidate).await?;
            let (movie, created) = store.upsert_movie(candidate).await?;
            let outcome = store.insert_screening_if_absent(movie.id, theater_id, candidate).await?;
            Ok::<_, AppError>((movie, created, outcome))
        }
        .await;

        match result {
            Ok((movie, created, outcome)) => {
                match outcome {
                    InsertOutcome::Created => stats.new_screenings += 1,
                    InsertOutcome::AlreadyExists => stats.duplicates += 1,
                }
                if created {
                    stats.new_movies += 1;
                    if let Some(enricher) = enricher {
                        if enrich_movie(store, enricher, movie, false).await {
                            stats.enriched += 1;
                        }
                    }
                }
            },
            Err(err) => {
                warn!(source = %source.name(), title = %candidate.title, error = %err, "failed to store candidate");
                stats.failed_items += 1;
                first_error.get_or_insert(err);
            },
        }
    }

    match first_error {
        Some(err) => SourceOutcome::PartialFailure { error: err.to_string(), stats },
        None => SourceOutcome::Completed(stats),
    }
}

/// Theater rows are created on the first screening that needs them.
async fn theater_id(
    store: &Store,
    source: &dyn Source,
    cache: &mut HashMap<String, i32>,
    candidate: &ScreeningCandidate,
) -> AppResult<i32> {
    if let Some(id) = cache.get(&candidate.theater) {
        return Ok(*id);
    }
    let info = source
        .theaters()
        .iter()
        .find(|t| t.name == candidate.theater)
        .ok_or_else(|| AppError::parse(source.name(), format!("unknown theater {:?}", candidate.theater)))?;
    let row = store.upsert_theater(info).await?;
    cache.insert(candidate.theater.clone(), row.id);
    Ok(row.id)
}

/// Looks a movie up in the catalog and stores what was found. Catalog trouble is logged and
/// leaves the movie for a later run.
async fn enrich_movie(store: &Store, enricher: &Enricher, movie: movie::Model, overwrite: bool) -> bool {
    let year = movie.year.and_then(|y| i16::try_from(y).ok());
    match enricher.enrich(&movie.title, year).await {
        Ok(Some(enrichment)) => {
            let title = movie.title.clone();
            match store.apply_enrichment(movie, &enrichment, overwrite).await {
                Ok(_) => true,
                Err(err) => {
                    warn!(title = %title, error = %err, "failed to store enrichment");
                    false
                },
            }
        },
        Ok(None) => {
            debug!(title = %movie.title, "no catalog match");
            false
        },
        Err(err) => {
            warn!(title = %movie.title, error = %err, "catalog lookup failed");
            false
        },
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnrichStats {
    pub considered: usize,
    pub enriched: usize,
    pub skipped: usize,
}

/// Enrichment pass over stored movies. Already-enriched rows are skipped unless `force`,
/// which also lets catalog values replace stored ones.
pub async fn enrich_pending(store: &Store, enricher: &Enricher, force: bool) -> AppResult<EnrichStats> {
    let total = store.counts().await?.movies as usize;
    let movies = store.movies_for_enrichment(force).await?;
    let mut stats = EnrichStats {
        considered: movies.len(),
        skipped: total.saturating_sub(movies.len()),
        ..Default::default()
    };

    for movie in movies {
        if enrich_movie(store, enricher, movie, force).await {
            stats.enriched += 1;
        }
    }
    info!(considered = stats.considered, enriched = stats.enriched, skipped = stats.skipped, "enrichment pass done");
    Ok(stats)
}
