use jiff::tz::TimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::OnConflict,
};

use crate::{
    datetime::{storage_now, to_storage},
    entities::{movie, screening, theater},
    error::AppResult,
    models::{Enrichment, ScreeningCandidate, TheaterInfo},
};

/// Result of an insert-if-absent on the screening key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    Created,
    AlreadyExists,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Counts {
    pub theaters: u64,
    pub movies: u64,
    pub screenings: u64,
}

/// Idempotent persistence of theaters, movies and screenings.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    canonical_tz: TimeZone,
}

impl Store {
    pub fn new(db: DatabaseConnection, canonical_tz: TimeZone) -> Self {
        Self { db, canonical_tz }
    }

    /// Looks a theater up by name, inserting it when missing.
    ///
    /// An existing row is never rewritten, except that coordinates are filled in when the row
    /// has none and `info` carries them.
    pub async fn upsert_theater(&self, info: &TheaterInfo) -> AppResult<theater::Model> {
        let existing = theater::Entity::find()
            .filter(theater::Column::Name.eq(info.name))
            .one(&self.db)
            .await?;

        if let Some(row) = existing {
            return match info.coordinates {
                Some((lat, lng)) if row.latitude.is_none() || row.longitude.is_none() => {
                    let mut active: theater::ActiveModel = row.into();
                    active.latitude = Set(Some(lat));
                    active.longitude = Set(Some(lng));
                    Ok(active.update(&self.db).await?)
                },
                _ => Ok(row),
            };
        }

        let model = theater::ActiveModel {
            name: Set(info.name.to_string()),
            address: Set(Some(info.address.to_string())),
            city: Set(Some(info.city.to_string())),
            state: Set(Some(info.state.to_string())),
            zip_code: Set(info.zip_code.map(String::from)),
            latitude: Set(info.coordinates.map(|c| c.0)),
            longitude: Set(info.coordinates.map(|c| c.1)),
            website: Set(Some(info.website.to_string())),
            description: Set(info.description.map(String::from)),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    /// Finds a movie by exact title or creates it from the first candidate seen.
    ///
    /// Returns the row and whether it was created.
    pub async fn upsert_movie(&self, candidate: &ScreeningCandidate) -> AppResult<(movie::Model, bool)> {
        if let Some(row) = movie::Entity::find()
            .filter(movie::Column::Title.eq(candidate.title.as_str()))
            .one(&self.db)
            .await?
        {
            return Ok((row, false));
        }

        let now = now_sec();
        let model = movie::ActiveModel {
            title: Set(candidate.title.clone()),
            director: Set(None),
            credit_kind: Set(None),
            year: Set(None),
            runtime: Set(candidate.runtime.and_then(|r| i32::try_from(r).ok())),
            format: Set(Some(candidate.format.clone())),
            tmdb_id: Set(None),
            poster_url: Set(candidate.poster_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok((model.insert(&self.db).await?, true))
    }

    /// Inserts the screening unless (movie, theater, start) is already stored.
    pub async fn insert_screening_if_absent(
        &self,
        movie_id: i32,
        theater_id: i32,
        candidate: &ScreeningCandidate,
    ) -> AppResult<InsertOutcome> {
        let key = to_storage(&candidate.starts_at, &self.canonical_tz);

        let existing = screening::Entity::find()
            .filter(screening::Column::MovieId.eq(movie_id))
            .filter(screening::Column::TheaterId.eq(theater_id))
            .filter(screening::Column::ScreeningDatetime.eq(key.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let model = screening::ActiveModel {
            movie_id: Set(movie_id),
            theater_id: Set(theater_id),
            screening_datetime: Set(key),
            ticket_url: Set(candidate.ticket_url.clone()),
            special_notes: Set(candidate.special_notes.clone()),
            format: Set(Some(candidate.format.clone())),
            created_at: Set(now_sec()),
            ..Default::default()
        };

        // The unique index settles any insert that raced past the lookup.
        let inserted = screening::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    screening::Column::MovieId,
                    screening::Column::TheaterId,
                    screening::Column::ScreeningDatetime,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(if inserted > 0 { InsertOutcome::Created } else { InsertOutcome::AlreadyExists })
    }

    /// Movies still missing a credit or poster, or every movie when `force` is set.
    pub async fn movies_for_enrichment(&self, force: bool) -> AppResult<Vec<movie::Model>> {
        let movies = movie::Entity::find().order_by_asc(movie::Column::Id).all(&self.db).await?;
        Ok(movies.into_iter().filter(|m| force || !m.is_enriched()).collect())
    }

    /// Writes catalog metadata onto a movie. Only empty fields are filled unless `overwrite`.
    pub async fn apply_enrichment(
        &self,
        row: movie::Model,
        enrichment: &Enrichment,
        overwrite: bool,
    ) -> AppResult<movie::Model> {
        let mut active: movie::ActiveModel = row.clone().into();
        let mut changed = false;

        if let Some(name) = enrichment.credit.name() {
            if overwrite || row.director.is_none() {
                active.director = Set(Some(name.to_string()));
                active.credit_kind = Set(enrichment.credit.kind().map(String::from));
                changed = true;
            }
        }
        if let Some(poster) = &enrichment.poster_url {
            if overwrite || row.poster_url.is_none() {
                active.poster_url = Set(Some(poster.clone()));
                changed = true;
            }
        }
        if let Some(id) = enrichment.tmdb_id {
            if overwrite || row.tmdb_id.is_none() {
                active.tmdb_id = Set(Some(id));
                changed = true;
            }
        }
        if let Some(runtime) = enrichment.runtime.and_then(|r| i32::try_from(r).ok()) {
            if overwrite || row.runtime.is_none() {
                active.runtime = Set(Some(runtime));
                changed = true;
            }
        }
        if let Some(year) = enrichment.year {
            if overwrite || row.year.is_none() {
                active.year = Set(Some(i32::from(year)));
                changed = true;
            }
        }

        if !changed {
            return Ok(row);
        }
        active.updated_at = Set(now_sec());
        Ok(active.update(&self.db).await?)
    }

    pub async fn counts(&self) -> AppResult<Counts> {
        Ok(Counts {
            theaters: theater::Entity::find().count(&self.db).await?,
            movies: movie::Entity::find().count(&self.db).await?,
            screenings: screening::Entity::find().count(&self.db).await?,
        })
    }

    pub async fn theaters(&self) -> AppResult<Vec<theater::Model>> {
        Ok(theater::Entity::find().order_by_asc(theater::Column::Name).all(&self.db).await?)
    }

    /// The next `limit` screenings at a theater, soonest first, with their movie.
    pub async fn upcoming(
        &self,
        theater_id: i32,
        limit: u64,
    ) -> AppResult<Vec<(screening::Model, Option<movie::Model>)>> {
        let now = storage_now(&self.canonical_tz);
        Ok(screening::Entity::find()
            .filter(screening::Column::TheaterId.eq(theater_id))
            .filter(screening::Column::ScreeningDatetime.gt(now))
            .order_by_asc(screening::Column::ScreeningDatetime)
            .limit(limit)
            .find_also_related(movie::Entity)
            .all(&self.db)
            .await?)
    }
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
