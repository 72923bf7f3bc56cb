//! Database migrations for the Lure platform

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
