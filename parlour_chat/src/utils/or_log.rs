use std::fmt::Display;

/// Consume a result whose failure should be recorded but not propagated.
pub trait OrLog
{
    /// Log an error at `error` level with the given context.
    fn or_log(self, context: impl Display);

    /// As [`or_log`](OrLog::or_log), at `warn` level. Used for failures that
    /// are expected during ordinary disconnects.
    fn or_warn(self, context: impl Display);
}

impl<T, E: Display> OrLog for Result<T,E>
{
    fn or_log(self, context: impl Display)
    {
        if let Err(e) = self
        {
            tracing::error!(error = %e, "{}", context);
        }
    }

    fn or_warn(self, context: impl Display)
    {
        if let Err(e) = self
        {
            tracing::warn!(error = %e, "{}", context);
        }
    }
}
