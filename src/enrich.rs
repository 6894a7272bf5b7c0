//! Bridges scraped titles to catalog metadata (credit, poster, runtime).

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::{
    error::AppResult,
    matching::best_match,
    models::{Credit, Enrichment},
    tmdb::{CatalogHit, MetadataCatalog},
};

const TV_KEYWORDS: [&str; 3] = ["SEASON", "EPISODE", "EP."];
/// Presentation tokens that catalog titles never carry.
const PRESENTATION_SUFFIXES: [&str; 5] = [" 3D", " IMAX", " 2D", " 70MM", " 35MM"];

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\((\d{4})\)").expect("valid regex"));
static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([A-Za-z]+\)\s*$").expect("valid regex"));
static EVENT_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\s*-\s*Early Access$",
        r"(?i)\s*\(Reissue\)$",
        r"(?i)\s*\(In Person\)$",
        r"(?i)\s*\(Cinematographer In Person\)$",
        r"(?i)\s*-\s*Hong Kong Cinema Classics$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static EVENT_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^Cinematic Void Presents\s+(.+)",
        r"(?i)^The Greg Proops Film Club Presents\s+(.+)",
        r"(?i)^JANS:\s*(.+)",
        r"(?i)^Met Op:\s*(.+)",
        r"(?i)^IMAX:\s*(.+)",
        r"(?i)^3D:\s*(.+)",
        r"(?i)^70mm:\s*(.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub struct Enricher {
    catalog: Arc<dyn MetadataCatalog>,
}

impl Enricher {
    pub fn new(catalog: Arc<dyn MetadataCatalog>) -> Self {
        Self { catalog }
    }

    /// Canonical metadata for `title`, or `None` when the catalog has nothing close.
    ///
    /// A stored double bill ("A / B") is looked up half by half and the credits joined.
    pub async fn enrich(&self, title: &str, year_hint: Option<i16>) -> AppResult<Option<Enrichment>> {
        let parts: Vec<&str> = title.split(" / ").map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return self.enrich_single(title, year_hint).await;
        }

        let mut found = Vec::new();
        for part in parts {
            if let Some(enrichment) = self.enrich_single(part, year_hint).await? {
                found.push(enrichment);
            }
        }
        Ok(combine(found))
    }

    async fn enrich_single(&self, title: &str, year_hint: Option<i16>) -> AppResult<Option<Enrichment>> {
        if is_tv(title) {
            return self.enrich_tv(title).await;
        }

        let Some(hit) = self.search_movie(title, year_hint).await? else {
            debug!(title, "no catalog match");
            return Ok(None);
        };
        let director = self.catalog.movie_director(hit.id).await?;
        let runtime = self.catalog.movie_runtime(hit.id).await?;
        Ok(Some(Enrichment {
            credit: director.map_or(Credit::Unknown, Credit::Director),
            poster_url: hit.poster_url(),
            tmdb_id: Some(hit.id),
            runtime,
            year: hit.year,
        }))
    }

    async fn enrich_tv(&self, title: &str) -> AppResult<Option<Enrichment>> {
        let show = show_name(title);
        let Some(hit) = self.catalog.search_tv(show).await?.into_iter().next() else {
            debug!(show, "no TV match");
            return Ok(None);
        };
        let creator = self.catalog.tv_creator(hit.id).await?;
        Ok(Some(Enrichment {
            credit: creator.map_or(Credit::Unknown, Credit::Creator),
            poster_url: hit.poster_url(),
            tmdb_id: Some(hit.id),
            runtime: None,
            year: hit.year,
        }))
    }

    /// Progressively looser queries; the first that returns anything wins.
    async fn search_movie(&self, title: &str, year_hint: Option<i16>) -> AppResult<Option<CatalogHit>> {
        let (stripped, explicit_year) = extract_year(title);
        let year = year_hint.or(explicit_year);
        let query = clean_query(&stripped);

        if let Some(hit) = self.try_search(&query, year).await? {
            return Ok(Some(hit));
        }
        if year.is_some() {
            if let Some(hit) = self.try_search(&query, None).await? {
                return Ok(Some(hit));
            }
        }
        let lower = query.to_lowercase();
        for suffix in PRESENTATION_SUFFIXES {
            if lower.contains(&suffix.to_lowercase()) {
                let trimmed = query.replace(suffix, "").replace(&suffix.to_lowercase(), "");
                if let Some(hit) = self.try_search(trimmed.trim(), year).await? {
                    return Ok(Some(hit));
                }
            }
        }
        if let Some((base, _)) = query.split_once('(') {
            if let Some(hit) = self.try_search(base.trim(), year).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    async fn try_search(&self, query: &str, year: Option<i16>) -> AppResult<Option<CatalogHit>> {
        if query.is_empty() {
            return Ok(None);
        }
        let hits = self.catalog.search_movies(query, year).await?;
        Ok(best_match(query, hits))
    }
}

/// Merges the halves of a double bill. Credits are joined with " / ".
fn combine(found: Vec<Enrichment>) -> Option<Enrichment> {
    let names: Vec<String> =
        found.iter().filter_map(|e| e.credit.name()).map(String::from).collect();
    let mut found = found.into_iter();
    let first = found.next()?;
    let credit = if names.is_empty() { Credit::Unknown } else { Credit::Director(names.join(" / ")) };
    Some(Enrichment { credit, ..first })
}

pub fn is_tv(title: &str) -> bool {
    let upper = title.to_uppercase();
    TV_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// "TWIN PEAKS: Season 1, Ep. 3" → "TWIN PEAKS".
pub fn show_name(title: &str) -> &str {
    title.split(':').next().unwrap_or(title).trim()
}

/// Pulls an explicit "(1993)" out of the title.
pub fn extract_year(title: &str) -> (String, Option<i16>) {
    let year = YEAR.captures(title).and_then(|c| c.get(1)?.as_str().parse().ok());
    match year {
        Some(year) => (YEAR.replace_all(title, "").trim().to_string(), Some(year)),
        None => (title.trim().to_string(), None),
    }
}

/// Strips event dressing so the query looks like a catalog title.
pub fn clean_query(title: &str) -> String {
    let mut cleaned = LANGUAGE_TAG.replace(title.trim(), "").to_string();
    for suffix in EVENT_SUFFIXES.iter() {
        cleaned = suffix.replace(&cleaned, "").to_string();
    }
    if let Some(caps) = EVENT_PREFIXES.iter().find_map(|p| p.captures(&cleaned)) {
        if let Some(inner) = caps.get(1) {
            cleaned = inner.as_str().trim().to_string();
        }
    }
    if is_all_caps(&cleaned) {
        cleaned = title_case(&cleaned);
    }
    cleaned.trim().to_string()
}

fn is_all_caps(s: &str) -> bool {
    s.chars().count() > 3 && s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}


#[cfg(test)]
mod tests {
    use super::{fake::FakeCatalog, *};

    #[test]
    fn query_cleaning() {
        assert_eq!(clean_query("Pushpa 2 (Telugu)"), "Pushpa 2");
        assert_eq!(clean_query("Nosferatu - Early Access"), "Nosferatu");
        assert_eq!(clean_query("Cinematic Void Presents Phantasm"), "Phantasm");
        assert_eq!(clean_query("Met Op: Aida"), "Aida");
        assert_eq!(clean_query("THE THING"), "The Thing");
        assert_eq!(clean_query("RAN"), "RAN");
        assert_eq!(extract_year("Scarface (1983)"), ("Scarface".to_string(), Some(1983)));
        assert_eq!(extract_year("Heat"), ("Heat".to_string(), None));
    }

    #[test]
    fn tv_detection() {
        assert!(is_tv("TWIN PEAKS: Season 1, Ep. 3"));
        assert!(is_tv("The Office Episode 4"));
        assert!(!is_tv("Seven Samurai"));
        assert_eq!(show_name("TWIN PEAKS: Season 1, Ep. 3"), "TWIN PEAKS");
    }

    #[tokio::test]
    async fn movie_enrichment_uses_year_then_falls_back() {
        let catalog = Arc::new(FakeCatalog::default().with_movie("The Long Goodbye", 1421, "The Long Goodbye", "Robert Altman"));
        let enricher = Enricher::new(catalog.clone());

        let got = enricher.enrich("The Long Goodbye", Some(1972)).await.unwrap().unwrap();
        assert_eq!(got.credit, Credit::Director("Robert Altman".into()));
        assert_eq!(got.tmdb_id, Some(1421));
        assert_eq!(got.poster_url.as_deref(), Some("https://image.tmdb.org/t/p/w500/1421.jpg"));
        assert_eq!(got.runtime, Some(112));

        // The fake ignores the year, so the first query already hits.
        let queries = catalog.queries.lock().unwrap().clone();
        assert_eq!(queries, vec![("The Long Goodbye".to_string(), Some(1972))]);
    }

    #[tokio::test]
    async fn presentation_suffix_is_dropped_when_needed() {
        let catalog = Arc::new(FakeCatalog::default().with_movie("Oppenheimer", 872585, "Oppenheimer", "Christopher Nolan"));
        let enricher = Enricher::new(catalog.clone());

        let got = enricher.enrich("Oppenheimer IMAX", None).await.unwrap().unwrap();
        assert_eq!(got.tmdb_id, Some(872585));
        let queries: Vec<String> = catalog.queries.lock().unwrap().iter().map(|q| q.0.clone()).collect();
        assert_eq!(queries, vec!["Oppenheimer IMAX", "Oppenheimer"]);
    }

    #[tokio::test]
    async fn double_feature_credits_are_joined() {
        let catalog = Arc::new(
            FakeCatalog::default()
                .with_movie("The Long Goodbye", 1, "The Long Goodbye", "Robert Altman")
                .with_movie("Night Moves", 2, "Night Moves", "Arthur Penn"),
        );
        let got = Enricher::new(catalog).enrich("The Long Goodbye / Night Moves", None).await.unwrap().unwrap();
        assert_eq!(got.credit, Credit::Director("Robert Altman / Arthur Penn".into()));
        assert_eq!(got.tmdb_id, Some(1));
    }

    #[tokio::test]
    async fn tv_titles_get_creator_credit() {
        let mut catalog = FakeCatalog::default();
        catalog.tv.insert(
            "TWIN PEAKS".into(),
            vec![CatalogHit { id: 1920, title: "Twin Peaks".into(), popularity: 50.0, poster_path: None, year: Some(1990) }],
        );
        catalog.creators.insert(1920, "Mark Frost".into());

        let got = Enricher::new(Arc::new(catalog)).enrich("TWIN PEAKS: Season 1, Ep. 3", None).await.unwrap().unwrap();
        assert_eq!(got.credit, Credit::Creator("Mark Frost".into()));
        assert_eq!(got.runtime, None);
    }

    #[tokio::test]
    async fn miss_is_none_and_failures_propagate() {
        let enricher = Enricher::new(Arc::new(FakeCatalog::default()));
        assert_eq!(enricher.enrich("Unknown Picture", None).await.unwrap(), None);

        let failing = Enricher::new(Arc::new(FakeCatalog { failing: true, ..Default::default() }));
        assert!(failing.enrich("Heat", None).await.is_err());
    }
}
