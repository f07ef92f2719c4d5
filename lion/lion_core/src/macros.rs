//! Convenience macros for the Lion actor core.

/// Log a structured event at the given [`LogLevel`](crate::utils::LogLevel).
///
/// The message is prefixed with the calling module and followed by the
/// `key=value` fields, so distinct events stay greppable in plain-text logs.
///
/// # Examples
///
/// ```
/// use lion_core::log_event;
/// use lion_core::utils::LogLevel;
///
/// log_event!(LogLevel::Info, "mailbox created");
///
/// log_event!(LogLevel::Warning, "restart budget exceeded",
///     child => "worker-1",
///     failures => 4,
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $message:expr) => {
        $crate::__log::log!(
            $crate::utils::LogLevel::to_log_level($level),
            "[{}] {}",
            module_path!(),
            $message
        )
    };

    ($level:expr, $message:expr, $($key:ident => $value:expr),+ $(,)?) => {
        {
            let level = $crate::utils::LogLevel::to_log_level($level);
            if $crate::__log::log_enabled!(level) {
                let fields = $crate::utils::logging::format_fields(&[
                    $((stringify!($key), format!("{}", $value))),+
                ]);
                $crate::__log::log!(level, "[{}] {}: {}", module_path!(), $message, fields);
            }
        }
    };
}
