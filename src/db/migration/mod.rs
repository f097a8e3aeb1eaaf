pub use sea_orm_migration::prelude::*;

mod m20241204_062314_create_core_schema;
mod m20241204_062406_create_stored_functions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241204_062314_create_core_schema::Migration),
            Box::new(m20241204_062406_create_stored_functions::Migration),
        ]
    }
}
