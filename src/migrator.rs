use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_cart_tables::Migration),
            Box::new(m20240101_000003_create_order_tables::Migration),
            Box::new(m20240101_000004_create_payment_tables::Migration),
            Box::new(m20240101_000005_create_promo_and_otp_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Branches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Branches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Branches::Name).string().not_null())
                        .col(
                            ColumnDef::new(Branches::OtpConfirmationRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Branches::AdminChannel).string().null())
                        .col(ColumnDef::new(Branches::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Branches::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CatalogItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(CatalogItems::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::IsPriceEditable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::ApprovalRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(CatalogItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(CatalogItems::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BranchPrices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BranchPrices::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BranchPrices::BranchId).uuid().not_null())
                        .col(ColumnDef::new(BranchPrices::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(BranchPrices::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BranchPrices::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BranchPrices::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_branch_prices_branch_item")
                        .table(BranchPrices::Table)
                        .col(BranchPrices::BranchId)
                        .col(BranchPrices::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BranchPrices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CatalogItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Branches {
        Table,
        Id,
        Name,
        OtpConfirmationRequired,
        AdminChannel,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CatalogItems {
        Table,
        Id,
        Name,
        Price,
        IsActive,
        IsPriceEditable,
        ApprovalRequired,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum BranchPrices {
        Table,
        Id,
        BranchId,
        ItemId,
        Price,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_cart_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Carts::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Carts::Currency).string().not_null())
                        .col(
                            ColumnDef::new(Carts::IsCheckedOut)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Carts::SubTotal)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Carts::TotalDiscount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Carts::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Carts::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Carts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Carts::UpdatedAt).timestamp().not_null())
                        .col(
                            ColumnDef::new(Carts::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Lookup path for the single-open-cart rule.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_carts_customer_branch")
                        .table(Carts::Table)
                        .col(Carts::CustomerId)
                        .col(Carts::BranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ItemId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(CartItems::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_cart_item")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .col(CartItems::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Offers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Offers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Offers::Name).string().not_null())
                        .col(ColumnDef::new(Offers::Kind).string_len(24).not_null())
                        .col(ColumnDef::new(Offers::Value).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Offers::StartsAt).timestamp().not_null())
                        .col(ColumnDef::new(Offers::EndsAt).timestamp().not_null())
                        .col(
                            ColumnDef::new(Offers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Offers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Offers::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OfferItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OfferItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OfferItems::OfferId).uuid().not_null())
                        .col(ColumnDef::new(OfferItems::ItemId).uuid().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartOffers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartOffers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartOffers::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartOffers::OfferId).uuid().not_null())
                        .col(ColumnDef::new(CartOffers::AppliedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_offers_cart_offer")
                        .table(CartOffers::Table)
                        .col(CartOffers::CartId)
                        .col(CartOffers::OfferId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(CartOffers::Table).to_owned(),
                Table::drop().table(OfferItems::Table).to_owned(),
                Table::drop().table(Offers::Table).to_owned(),
                Table::drop().table(CartItems::Table).to_owned(),
                Table::drop().table(Carts::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Carts {
        Table,
        Id,
        CustomerId,
        BranchId,
        Currency,
        IsCheckedOut,
        SubTotal,
        TotalDiscount,
        TotalAmount,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    pub(super) enum CartItems {
        Table,
        Id,
        CartId,
        ItemId,
        Quantity,
        UnitPrice,
        TotalPrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Offers {
        Table,
        Id,
        Name,
        Kind,
        Value,
        StartsAt,
        EndsAt,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OfferItems {
        Table,
        Id,
        OfferId,
        ItemId,
    }

    #[derive(DeriveIden)]
    pub(super) enum CartOffers {
        Table,
        Id,
        CartId,
        OfferId,
        AppliedAt,
    }
}

mod m20240101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_tables"
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
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::CartId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(24).not_null())
                        .col(
                            ColumnDef::new(Orders::SubTotal)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalDiscount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::PaidAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::PromoCodeId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::OtpRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::FinalizedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // An order is created from exactly one cart.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_cart_id")
                        .table(Orders::Table)
                        .col(Orders::CartId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderHistory::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderHistory::FromStatus)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderHistory::ToStatus)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderHistory::ActorId).uuid().not_null())
                        .col(ColumnDef::new(OrderHistory::Reason).string().null())
                        .col(ColumnDef::new(OrderHistory::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_history_order_id")
                        .table(OrderHistory::Table)
                        .col(OrderHistory::OrderId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(OrderHistory::Table).to_owned(),
                Table::drop().table(OrderItems::Table).to_owned(),
                Table::drop().table(Orders::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        CartId,
        CustomerId,
        BranchId,
        Currency,
        Status,
        SubTotal,
        TotalDiscount,
        TotalAmount,
        PaidAmount,
        PromoCodeId,
        OtpRequired,
        FinalizedAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderItems {
        Table,
        Id,
        OrderId,
        ItemId,
        Name,
        Quantity,
        UnitPrice,
        TotalPrice,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderHistory {
        Table,
        Id,
        OrderId,
        FromStatus,
        ToStatus,
        ActorId,
        Reason,
        CreatedAt,
    }
}

mod m20240101_000004_create_payment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_payment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Payments::CustomerId).uuid().not_null())
                        .col(
                            ColumnDef::new(Payments::IdempotencyKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Payments::ErrorMessage).string().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // Retried requests must never duplicate a monetary effect.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_idempotency_key")
                        .table(Payments::Table)
                        .col(Payments::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Method)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_transactions_payment_id")
                        .table(PaymentTransactions::Table)
                        .col(PaymentTransactions::PaymentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerBalances::CustomerId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::Balance)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(CustomerBalances::Table).to_owned(),
                Table::drop().table(PaymentTransactions::Table).to_owned(),
                Table::drop().table(Payments::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Payments {
        Table,
        Id,
        OrderId,
        CustomerId,
        IdempotencyKey,
        Amount,
        Status,
        ErrorMessage,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PaymentTransactions {
        Table,
        Id,
        PaymentId,
        OrderId,
        Method,
        Amount,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CustomerBalances {
        Table,
        CustomerId,
        Balance,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000005_create_promo_and_otp_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_promo_and_otp_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromoCodes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PromoCodes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(PromoCodes::Code).string().not_null())
                        .col(
                            ColumnDef::new(PromoCodes::DiscountAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoCodes::StartsAt).timestamp().not_null())
                        .col(ColumnDef::new(PromoCodes::EndsAt).timestamp().not_null())
                        .col(ColumnDef::new(PromoCodes::MaxMembers).integer().null())
                        .col(
                            ColumnDef::new(PromoCodes::UsageCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(PromoCodes::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(PromoCodes::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promo_codes_code")
                        .table(PromoCodes::Table)
                        .col(PromoCodes::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OtpCodes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OtpCodes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OtpCodes::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OtpCodes::Code).string_len(10).not_null())
                        .col(ColumnDef::new(OtpCodes::ExpiresAt).timestamp().not_null())
                        .col(
                            ColumnDef::new(OtpCodes::Verified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(OtpCodes::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_otp_codes_order_created")
                        .table(OtpCodes::Table)
                        .col(OtpCodes::OrderId)
                        .col(OtpCodes::CreatedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OtpCodes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PromoCodes::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PromoCodes {
        Table,
        Id,
        Code,
        DiscountAmount,
        StartsAt,
        EndsAt,
        MaxMembers,
        UsageCount,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OtpCodes {
        Table,
        Id,
        OrderId,
        Code,
        ExpiresAt,
        Verified,
        CreatedAt,
    }
}
