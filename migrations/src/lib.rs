pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users_table;
mod m20250301_000002_create_movies_table;
mod m20250301_000003_create_coupons_table;
mod m20250301_000004_create_carts_tables;
mod m20250301_000005_create_orders_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users_table::Migration),
            Box::new(m20250301_000002_create_movies_table::Migration),
            Box::new(m20250301_000003_create_coupons_table::Migration),
            Box::new(m20250301_000004_create_carts_tables::Migration),
            Box::new(m20250301_000005_create_orders_table::Migration),
        ]
    }
}
