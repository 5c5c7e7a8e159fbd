use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Certificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Certificates::Handle)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Certificates::Domain).string().not_null())
                    .col(ColumnDef::new(Certificates::KeyAlgorithm).string().not_null())
                    .col(ColumnDef::new(Certificates::Status).string().not_null())
                    .col(ColumnDef::new(Certificates::CertPem).text().not_null())
                    .col(ColumnDef::new(Certificates::KeyPem).text().not_null())
                    .col(ColumnDef::new(Certificates::NotAfter).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Certificates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("certificates_reuse_idx")
                    .table(Certificates::Table)
                    .col(Certificates::Status)
                    .col(Certificates::KeyAlgorithm)
                    .col(Certificates::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Certificates::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Certificates {
    Table,
    Handle,
    Domain,
    KeyAlgorithm,
    Status,
    CertPem,
    KeyPem,
    NotAfter,
    CreatedAt,
}
