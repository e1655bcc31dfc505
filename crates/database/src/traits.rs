/// DDL for one table of the identity store.
///
/// Statements are `&'static str` built with [`const_format::concatcp!`]
/// and must be idempotent (`IF NOT EXISTS`), since
/// [`Postgres::migrate`](crate::Postgres::migrate) runs them on every start.
pub trait Schema {
    fn name() -> &'static str;
    /// `CREATE TABLE IF NOT EXISTS` with named constraints.
    fn creates() -> &'static str;
    /// `CREATE INDEX IF NOT EXISTS` statements.
    fn indices() -> &'static str;
}
