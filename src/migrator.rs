use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_orders_table::Migration),
            Box::new(m20240101_000003_create_order_lines_table::Migration),
            Box::new(m20240101_000004_create_pick_events_table::Migration),
            Box::new(m20240101_000005_create_stock_exceptions_table::Migration),
            Box::new(m20240101_000006_create_sync_logs_table::Migration),
            Box::new(m20240101_000007_create_config_tables::Migration),
            Box::new(m20240101_000008_create_users_table::Migration),
            Box::new(m20240101_000009_create_refresh_tokens_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Title).string().not_null())
                        .col(ColumnDef::new(Products::Category).string().not_null())
                        .col(ColumnDef::new(Products::Subcategory).string().null())
                        .col(ColumnDef::new(Products::VendorName).string().null())
                        .col(ColumnDef::new(Products::VariationDetails).string().null())
                        .col(ColumnDef::new(Products::ImageUrl).string().null())
                        .col(ColumnDef::new(Products::Price).decimal().null())
                        .col(ColumnDef::new(Products::Weight).string().null())
                        .col(
                            ColumnDef::new(Products::ItemType)
                                .string()
                                .not_null()
                                .default("product"),
                        )
                        .col(
                            ColumnDef::new(Products::StoreQuantityAvailable)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category")
                        .table(Products::Table)
                        .col(Products::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Sku,
        Title,
        Category,
        Subcategory,
        VendorName,
        VariationDetails,
        ImageUrl,
        Price,
        Weight,
        ItemType,
        StoreQuantityAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::ExternalId).string().not_null())
                        .col(ColumnDef::new(Orders::Number).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string()
                                .not_null()
                                .default("open"),
                        )
                        .col(
                            ColumnDef::new(Orders::ReadyToPack)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalShipments)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Orders::CurrentShipment)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Orders::CustomerMessage).text().null())
                        .col(
                            ColumnDef::new(Orders::EmailSent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::PackedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::PackedBy).string().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_external_id")
                        .table(Orders::Table)
                        .col(Orders::ExternalId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_ready_to_pack")
                        .table(Orders::Table)
                        .col(Orders::ReadyToPack)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        ExternalId,
        Number,
        CustomerName,
        Status,
        ReadyToPack,
        TotalShipments,
        CurrentShipment,
        CustomerMessage,
        EmailSent,
        PackedAt,
        PackedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_order_lines_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_products_table::Products;
    use super::m20240101_000002_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderId).big_integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::Sku).string().not_null())
                        .col(ColumnDef::new(OrderLines::Title).string().not_null())
                        .col(ColumnDef::new(OrderLines::Category).string().not_null())
                        .col(ColumnDef::new(OrderLines::ImageUrl).string().null())
                        .col(ColumnDef::new(OrderLines::QtyOrdered).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::QtyPicked)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderLines::QtyShort)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderLines::ShipmentBatch)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(OrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_order")
                                .from(OrderLines::Table, OrderLines::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_product")
                                .from(OrderLines::Table, OrderLines::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_lines_order_product")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .col(OrderLines::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_lines_product")
                        .table(OrderLines::Table)
                        .col(OrderLines::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_lines_sku")
                        .table(OrderLines::Table)
                        .col(OrderLines::Sku)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        Sku,
        Title,
        Category,
        ImageUrl,
        QtyOrdered,
        QtyPicked,
        QtyShort,
        ShipmentBatch,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_pick_events_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000003_create_order_lines_table::OrderLines;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_pick_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PickEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PickEvents::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PickEvents::OrderLineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PickEvents::DeltaQty).integer().not_null())
                        .col(ColumnDef::new(PickEvents::Kind).string().not_null())
                        .col(ColumnDef::new(PickEvents::Username).string().not_null())
                        .col(
                            ColumnDef::new(PickEvents::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PickEvents::Notes).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pick_events_order_line")
                                .from(PickEvents::Table, PickEvents::OrderLineId)
                                .to(OrderLines::Table, OrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pick_events_order_line")
                        .table(PickEvents::Table)
                        .col(PickEvents::OrderLineId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pick_events_timestamp")
                        .table(PickEvents::Table)
                        .col(PickEvents::Timestamp)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PickEvents::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum PickEvents {
        Table,
        Id,
        OrderLineId,
        DeltaQty,
        Kind,
        Username,
        Timestamp,
        Notes,
    }
}

mod m20240101_000005_create_stock_exceptions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_stock_exceptions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockExceptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockExceptions::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockExceptions::Sku).string().not_null())
                        .col(
                            ColumnDef::new(StockExceptions::ProductTitle)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::Category)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockExceptions::VendorName).string().null())
                        .col(
                            ColumnDef::new(StockExceptions::QtyShort)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::OrderNumbers)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::ReportedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::Resolved)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::OrderedFromCompany)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::NaCancel)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StockExceptions::Notes)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_exceptions_sku")
                        .table(StockExceptions::Table)
                        .col(StockExceptions::Sku)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_exceptions_timestamp")
                        .table(StockExceptions::Table)
                        .col(StockExceptions::Timestamp)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_exceptions_resolved")
                        .table(StockExceptions::Table)
                        .col(StockExceptions::Resolved)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockExceptions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum StockExceptions {
        Table,
        Id,
        Sku,
        ProductTitle,
        Category,
        VendorName,
        QtyShort,
        OrderNumbers,
        ReportedBy,
        Timestamp,
        Resolved,
        OrderedFromCompany,
        NaCancel,
        Notes,
    }
}

mod m20240101_000006_create_sync_logs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_sync_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SyncLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SyncLogs::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::StartedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::Status)
                                .string()
                                .not_null()
                                .default("in_progress"),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::OrdersFetched)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::OrdersCreated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::OrdersUpdated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::OrdersAutoPacked)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::ProductsCreated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::ProductsUpdated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::ItemsCreated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::ItemsUpdated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SyncLogs::Warnings)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SyncLogs::ErrorMessage).text().null())
                        .col(ColumnDef::new(SyncLogs::DetailedErrors).json().not_null())
                        .col(ColumnDef::new(SyncLogs::TriggeredBy).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sync_logs_started_at")
                        .table(SyncLogs::Table)
                        .col(SyncLogs::StartedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sync_logs_status")
                        .table(SyncLogs::Table)
                        .col(SyncLogs::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SyncLogs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum SyncLogs {
        Table,
        Id,
        StartedAt,
        CompletedAt,
        Status,
        OrdersFetched,
        OrdersCreated,
        OrdersUpdated,
        OrdersAutoPacked,
        ProductsCreated,
        ProductsUpdated,
        ItemsCreated,
        ItemsUpdated,
        Warnings,
        ErrorMessage,
        DetailedErrors,
        TriggeredBy,
    }
}

mod m20240101_000007_create_config_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_config_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ApiConfig::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ApiConfig::Id)
                                .big_integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::ApiBaseUrl)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::ApiKey)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::SyncIntervalMinutes)
                                .integer()
                                .not_null()
                                .default(10),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::AutoSyncEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::LastSyncAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::LastSyncStatus)
                                .string()
                                .not_null()
                                .default("never"),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::LastSyncMessage)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ApiConfig::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(NotifierConfig::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(NotifierConfig::Id)
                                .big_integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::EmailEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpHost)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpPort)
                                .integer()
                                .not_null()
                                .default(587),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpUseTls)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpUseSsl)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpUsername)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmtpPassword)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::FromEmail)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::EmailRecipients)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmsEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::TwilioAccountSid)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::TwilioAuthToken)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::TwilioFromNumber)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::SmsRecipients)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotifierConfig::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(NotifierConfig::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ApiConfig::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum ApiConfig {
        Table,
        Id,
        ApiBaseUrl,
        ApiKey,
        SyncIntervalMinutes,
        AutoSyncEnabled,
        LastSyncAt,
        LastSyncStatus,
        LastSyncMessage,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum NotifierConfig {
        Table,
        Id,
        EmailEnabled,
        SmtpHost,
        SmtpPort,
        SmtpUseTls,
        SmtpUseSsl,
        SmtpUsername,
        SmtpPassword,
        FromEmail,
        EmailRecipients,
        SmsEnabled,
        TwilioAccountSid,
        TwilioAuthToken,
        TwilioFromNumber,
        SmsRecipients,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000008_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Users::Username).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string()
                                .not_null()
                                .default("staff"),
                        )
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
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
                        .name("idx_users_username")
                        .table(Users::Table)
                        .col(Users::Username)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        Role,
        Phone,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000009_create_refresh_tokens_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000008_create_users_table::Users;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000009_create_refresh_tokens_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RefreshTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RefreshTokens::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::UserId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RefreshTokens::TokenHash).string().not_null())
                        .col(
                            ColumnDef::new(RefreshTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::Revoked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_refresh_tokens_user")
                                .from(RefreshTokens::Table, RefreshTokens::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_refresh_tokens_token_hash")
                        .table(RefreshTokens::Table)
                        .col(RefreshTokens::TokenHash)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum RefreshTokens {
        Table,
        Id,
        UserId,
        TokenHash,
        CreatedAt,
        ExpiresAt,
        Revoked,
    }
}
