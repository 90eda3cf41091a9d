//! Structured log helpers.
//!
//! Every ledger log line carries a `component` field (`queue`, `support`,
//! `giveaway`, `store`) so JSON output can be filtered per component.

/// Emit a structured event tagged with a ledger component.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an account-scoped event with the standard `account` field.
#[macro_export]
macro_rules! log_account_event {
    ($level:ident, $component:expr, $msg:expr, $account:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            account = %$account,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_without_subscriber() {
        let account = 42u64;
        crate::log_event!(info, "queue", "rebalance finished", moved = 3);
        crate::log_event!(debug, "store", "commit");
        crate::log_account_event!(warn, "queue", "slot progress reset", account, slots = 2);
    }
}
