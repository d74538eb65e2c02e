use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum PortfolioViews {
    Table,
    ViewId,
    SubjectId,
    OsFamily,
    BrowserName,
    Timezone,
    IpCountry,
    IpRegion,
    IpCity,
    IpIsp,
    IpNetworkType,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PortfolioViews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PortfolioViews::ViewId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PortfolioViews::SubjectId).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::OsFamily).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::BrowserName).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::Timezone).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::IpCountry).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::IpRegion).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::IpCity).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::IpIsp).text().not_null())
                    .col(ColumnDef::new(PortfolioViews::IpNetworkType).text().not_null())
                    .col(
                        ColumnDef::new(PortfolioViews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_portfolio_views_subject_id")
                    .table(PortfolioViews::Table)
                    .col(PortfolioViews::SubjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PortfolioViews::Table).to_owned())
            .await
    }
}
