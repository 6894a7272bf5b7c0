//! Fuzzy ranking of catalog search hits against a scraped title.
//!
//! Scores are on a 0-100 scale. A hit's score is the best of three string measures plus a
//! small popularity boost, so a well-known film wins a near tie against an obscure one.

use strsim::normalized_levenshtein;

use crate::tmdb::CatalogHit;

/// Only the first few hits are worth scoring; the catalog already orders by relevance.
pub const CANDIDATES: usize = 5;
pub const ACCEPT_SCORE: f64 = 80.0;
const MAX_POPULARITY_BOOST: f64 = 5.0;

/// Whole-string similarity.
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Best similarity of the shorter string against every same-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    let short_len = short.chars().count();
    if short_len == 0 {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    let long: Vec<char> = long.chars().collect();
    long.windows(short_len)
        .map(|window| ratio(short, &window.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

/// Similarity with word order ignored.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

pub fn score(query: &str, hit: &CatalogHit) -> f64 {
    let q = query.to_lowercase();
    let t = hit.title.to_lowercase();
    let similarity = ratio(&q, &t).max(partial_ratio(&q, &t)).max(token_sort_ratio(&q, &t));
    similarity + (hit.popularity / 100.0).clamp(0.0, MAX_POPULARITY_BOOST)
}

/// Picks the hit to enrich from.
///
/// Hits are ranked by popularity; the best-scoring of the top [`CANDIDATES`] is taken when it
/// clears [`ACCEPT_SCORE`], otherwise the most popular hit. `None` only for an empty list.
pub fn best_match(query: &str, mut hits: Vec<CatalogHit>) -> Option<CatalogHit> {
    hits.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
    if hits.len() <= 1 {
        return hits.into_iter().next();
    }

    let (best, best_score) = hits
        .iter()
        .take(CANDIDATES)
        .enumerate()
        .map(|(i, hit)| (i, score(query, hit)))
        // Earlier (more popular) hits win ties.
        .fold((0, f64::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });

    let pick = if best_score >= ACCEPT_SCORE { best } else { 0 };
    Some(hits.swap_remove(pick))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i32, title: &str, popularity: f64) -> CatalogHit {
        CatalogHit { id, title: title.into(), popularity, poster_path: None, year: None }
    }

    #[test]
    fn measures() {
        assert_eq!(ratio("vertigo", "vertigo"), 100.0);
        assert_eq!(partial_ratio("alien", "aliens"), 100.0);
        assert_eq!(token_sort_ratio("goodbye the long", "the long goodbye"), 100.0);
        assert!(ratio("heat", "chinatown") < 50.0);
    }

    #[test]
    fn confident_match_beats_popularity() {
        let hits = vec![
            hit(1, "Blockbuster Sequel", 450.0),
            hit(2, "The Long Goodbye", 12.0),
            hit(3, "Goodbye Again", 80.0),
        ];
        assert_eq!(best_match("The Long Goodbye", hits).map(|h| h.id), Some(2));
    }

    #[test]
    fn falls_back_to_most_popular() {
        let hits = vec![hit(1, "Zzz", 3.0), hit(2, "Qqq", 40.0)];
        assert_eq!(best_match("Completely Different", hits).map(|h| h.id), Some(2));
        assert!(best_match("Anything", Vec::new()).is_none());
    }

    #[test]
    fn popularity_boost_is_capped() {
        let base = score("heat", &hit(1, "Heat", 0.0));
        let boosted = score("heat", &hit(1, "Heat", 10_000.0));
        assert_eq!(boosted - base, 5.0);
    }
}
