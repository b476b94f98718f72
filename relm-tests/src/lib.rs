mod apply;
mod commands;
mod memory;
mod models;
mod queries;
mod transactions;

pub use apply::apply;
pub use commands::{commands, composite_keys};
pub use memory::*;
pub use models::*;
pub use queries::queries;
pub use transactions::transactions;

use log::LevelFilter;
use relm::{Connection, Db};
use std::env;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against `db`.
///
/// The `people`, `memberships` and `docs.documents` tables must exist, the scenarios empty
/// them before starting.
pub async fn execute_tests<C: Connection>(db: &Db<C>) {
    commands(db).await;
    composite_keys(db).await;
    queries(db).await;
    apply(db).await;
    transactions(db).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
