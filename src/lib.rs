pub mod client;
pub mod command;
pub mod config;
pub mod index;
pub mod protocol;
pub mod rows;

pub use client::{Pool, PoolError, QueryResult, ResultCause, ResultFuture};
pub use command::{Command, CommandError, CompareOperator, Find, Modify};
pub use config::{ConfigError, ConnectionMode, PoolConfig};
pub use index::IndexDescriptor;
pub use rows::{Row, RowError, RowSet};
