use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Theaters::Table)
                    .if_not_exists()
                    .col(pk_auto(Theaters::Id))
                    .col(string_uniq(Theaters::Name))
                    .col(string_null(Theaters::Address))
                    .col(string_null(Theaters::City))
                    .col(string_null(Theaters::State))
                    .col(string_null(Theaters::ZipCode))
                    .col(double_null(Theaters::Latitude))
                    .col(double_null(Theaters::Longitude))
                    .col(string_null(Theaters::Website))
                    .col(string_null(Theaters::Description))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(string_uniq(Movies::Title))
                    .col(string_null(Movies::Director))
                    .col(integer_null(Movies::Year))
                    .col(integer_null(Movies::Runtime))
                    .col(string_null(Movies::Format))
                    .col(integer_null(Movies::TmdbId))
                    .col(string_null(Movies::PosterUrl))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Screenings::Table)
                    .if_not_exists()
                    .col(pk_auto(Screenings::Id))
                    .col(integer(Screenings::MovieId))
                    .col(integer(Screenings::TheaterId))
                    .col(string(Screenings::ScreeningDatetime))
                    .col(string_null(Screenings::TicketUrl))
                    .col(string_null(Screenings::SpecialNotes))
                    .col(big_integer(Screenings::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_screenings_movie")
                            .from(Screenings::Table, Screenings::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_screenings_theater")
                            .from(Screenings::Table, Screenings::TheaterId)
                            .to(Theaters::Table, Theaters::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_screening")
                    .table(Screenings::Table)
                    .col(Screenings::MovieId)
                    .col(Screenings::TheaterId)
                    .col(Screenings::ScreeningDatetime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_screening_datetime")
                    .table(Screenings::Table)
                    .col(Screenings::ScreeningDatetime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_screening_theater_id")
                    .table(Screenings::Table)
                    .col(Screenings::TheaterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_screening_created_at")
                    .table(Screenings::Table)
                    .col(Screenings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Screenings::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Theaters::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Theaters {
    Table,
    Id,
    Name,
    Address,
    City,
    State,
    ZipCode,
    Latitude,
    Longitude,
    Website,
    Description,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Director,
    Year,
    Runtime,
    Format,
    TmdbId,
    PosterUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Screenings {
    Table,
    Id,
    MovieId,
    TheaterId,
    ScreeningDatetime,
    TicketUrl,
    SpecialNotes,
    CreatedAt,
}
