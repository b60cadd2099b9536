//! Uniqueness check helper.

use sqlmapper_core::Value;

/// Run a duplicate check that tolerates the record itself.
///
/// A new record (unset `id`) may match no existing row; a record being
/// updated may match exactly one, its own. `check` receives that allowed
/// count and decides what to do with it.
///
/// ```rust,ignore
/// let unique = repeat_check(&user.primary_key_value(), |allowed| {
///     db.query::<User>().eq("email", &user.email).count().map(|n| n <= allowed)
/// })?;
/// ```
pub fn repeat_check<R>(id: &Value, check: impl FnOnce(u64) -> R) -> R {
    let expect_count = if id.is_unset_key() { 0 } else { 1 };
    check(expect_count)
}
