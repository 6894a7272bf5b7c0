use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

// SQLite accepts a single column change per ALTER TABLE.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Screenings::Table)
                    .add_column(string_null(Screenings::Format))
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Movies::Table)
                    .add_column(string_null(Movies::CreditKind))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter().table(Movies::Table).drop_column(Movies::CreditKind).to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter().table(Screenings::Table).drop_column(Screenings::Format).to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Screenings {
    Table,
    Format,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    CreditKind,
}
