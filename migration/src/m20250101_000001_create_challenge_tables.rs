use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyChallenges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyChallenges::Date)
                            .date()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyChallenges::Title).string().not_null())
                    .col(
                        ColumnDef::new(DailyChallenges::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyChallenges::Points).integer().not_null())
                    .col(ColumnDef::new(DailyChallenges::GameType).string().not_null())
                    .col(
                        ColumnDef::new(DailyChallenges::Difficulty)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyChallenges::Link).string().not_null())
                    .col(
                        ColumnDef::new(DailyChallenges::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SourceResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SourceResults::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SourceResults::UserId).uuid().not_null())
                    .col(ColumnDef::new(SourceResults::GameType).string().not_null())
                    .col(ColumnDef::new(SourceResults::Score).integer().not_null())
                    .col(
                        ColumnDef::new(SourceResults::CompletedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChallengeCompletions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChallengeCompletions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChallengeCompletions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ChallengeCompletions::ChallengeDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChallengeCompletions::CompletedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChallengeCompletions::GameType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChallengeCompletions::EarnedPoints)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChallengeCompletions::SourceResultId)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One completion per user per day; inserts rely on this to reject duplicates
        manager
            .create_index(
                Index::create()
                    .name("idx_challenge_completions_user_day")
                    .table(ChallengeCompletions::Table)
                    .col(ChallengeCompletions::UserId)
                    .col(ChallengeCompletions::ChallengeDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChallengeCompletions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SourceResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyChallenges::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyChallenges {
    Table,
    Date,
    Title,
    Description,
    Points,
    GameType,
    Difficulty,
    Link,
    IsActive,
}

#[derive(DeriveIden)]
enum SourceResults {
    Table,
    Id,
    UserId,
    GameType,
    Score,
    CompletedAt,
}

#[derive(DeriveIden)]
enum ChallengeCompletions {
    Table,
    Id,
    UserId,
    ChallengeDate,
    CompletedAt,
    GameType,
    EarnedPoints,
    SourceResultId,
}
