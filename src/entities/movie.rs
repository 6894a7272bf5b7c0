use sea_orm::entity::prelude::*;

use crate::models::Credit;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub title: String,
    pub director: Option<String>,
    pub credit_kind: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub format: Option<String>,
    pub tmdb_id: Option<i32>,
    pub poster_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Model {
    pub fn credit(&self) -> Credit {
        Credit::from_columns(self.director.as_deref(), self.credit_kind.as_deref())
    }

    pub fn is_enriched(&self) -> bool {
        self.director.is_some() && self.poster_url.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::screening::Entity")]
    Screening,
}

impl Related<super::screening::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Screening.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
