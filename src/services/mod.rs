pub mod import;
pub mod notifications;
pub mod order_state;
pub mod picking;
pub mod settings;
pub mod stock_exceptions;
pub mod users;

use sea_orm::{ConnectionTrait, DbBackend};

/// Row-level `FOR UPDATE` locks are only emitted on Postgres; the SQLite
/// test backend serializes writers on its own and rejects the clause.
pub(crate) fn supports_row_locks<C: ConnectionTrait>(conn: &C) -> bool {
    conn.get_database_backend() == DbBackend::Postgres
}
