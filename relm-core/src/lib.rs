mod as_value;
mod changes;
mod commands;
mod context;
mod db;
mod dialect;
mod error;
mod executor;
mod logger;
mod metadata;
mod querier;
mod queries;
mod query;
mod record;
mod tx;
mod util;
mod value;

pub use ::anyhow::Context as ResultContext;
pub use as_value::*;
pub use changes::*;
pub use context::*;
pub use db::*;
pub use dialect::*;
pub use error::*;
pub use executor::*;
pub use logger::*;
pub use metadata::*;
pub use querier::QueryRow;
pub use querier::Querier;
pub(crate) use querier::Target;
pub use query::*;
pub use record::*;
pub use tx::Tx;
pub(crate) use tx::TxHandle;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
