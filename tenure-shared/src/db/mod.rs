/// Database plumbing
///
/// - [`pool`]: Postgres pool with a startup health check
/// - [`migrations`]: embedded forward-only migrations
///
/// Entity queries live in [`crate::models`].

pub mod migrations;
pub mod pool;
