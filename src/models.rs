use jiff::Zoned;

/// Static description of a venue, as known to the source that lists it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TheaterInfo {
    pub name: &'static str,
    pub address: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub zip_code: Option<&'static str>,
    pub website: &'static str,
    pub coordinates: Option<(f64, f64)>,
    pub description: Option<&'static str>,
}

/// A screening as extracted from an upstream, before persistence.
#[derive(Clone, Debug)]
pub struct ScreeningCandidate {
    pub title: String,
    pub starts_at: Zoned,
    pub ticket_url: Option<String>,
    pub format: String,
    pub runtime: Option<u32>,
    pub special_notes: Option<String>,
    pub poster_url: Option<String>,
    /// Name of the [`TheaterInfo`] this screening belongs to.
    pub theater: String,
}

/// The time window an extractor is asked to cover.
#[derive(Clone, Debug)]
pub struct FetchWindow {
    pub now: Zoned,
    pub days: u32,
}

impl FetchWindow {
    pub fn new(now: Zoned, days: u32) -> Self {
        Self { now, days: days.max(1) }
    }
}

/// Who is credited for a title. Films have directors, TV has creators.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Credit {
    Director(String),
    Creator(String),
    Unknown,
}

impl Credit {
    pub fn name(&self) -> Option<&str> {
        match self {
            Credit::Director(name) | Credit::Creator(name) => Some(name),
            Credit::Unknown => None,
        }
    }

    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Credit::Director(_) => Some("director"),
            Credit::Creator(_) => Some("creator"),
            Credit::Unknown => None,
        }
    }

    pub fn from_columns(name: Option<&str>, kind: Option<&str>) -> Self {
        match (name, kind) {
            (Some(name), Some("creator")) => Credit::Creator(name.to_string()),
            (Some(name), _) => Credit::Director(name.to_string()),
            (None, _) => Credit::Unknown,
        }
    }
}

/// Canonical catalog metadata for one title.
#[derive(Clone, Debug, PartialEq)]
pub struct Enrichment {
    pub credit: Credit,
    pub poster_url: Option<String>,
    pub tmdb_id: Option<i32>,
    pub runtime: Option<u32>,
    pub year: Option<i16>,
}
