/// Turns a `Result` into an `Option`, logging the error instead of propagating it.
///
/// Used wherever a failure degrades a feature rather than aborting the caller, e.g.
/// `Manager::new(..).ok_log("resctrl monitoring disabled").unwrap_or_default()`.
pub trait ResultOkLogExt<T, E> {
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{context}: {err}");
                None
            }
        }
    }
}
