pub use sea_orm_migration::prelude::*;

mod m20250902_081512_create_users_table;
mod m20250902_082047_create_tasks_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250902_081512_create_users_table::Migration),
            Box::new(m20250902_082047_create_tasks_table::Migration),
        ]
    }
}
