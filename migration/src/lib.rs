pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_table;
mod m20260112_000001_add_screening_format;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_table::Migration),
            Box::new(m20260112_000001_add_screening_format::Migration),
        ]
    }
}
