//! Structured logging helpers.
//!
//! Every broker log line about a channel carries the same field names so log
//! queries can follow one channel id from request to teardown:
//! `component`, `channel_id`, `port_id`, `context`.

/// Log with the component field attached.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a channel-scoped event with standard fields.
#[macro_export]
macro_rules! log_channel_event {
    ($level:ident, $component:expr, $msg:expr, $channel_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            channel_id = %$channel_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a port-scoped event with standard fields.
#[macro_export]
macro_rules! log_port_event {
    ($level:ident, $component:expr, $msg:expr, $port_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            port_id = %$port_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a context-scoped event with standard fields.
#[macro_export]
macro_rules! log_context_event {
    ($level:ident, $component:expr, $msg:expr, $context:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            context = %$context,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_without_subscriber() {
        let channel = 7u32;
        let port = 15u32;
        crate::log_event!(info, "broker", "plain event", count = 3);
        crate::log_channel_event!(debug, "broker", "channel event", channel);
        crate::log_port_event!(warn, "broker", "port event", port, reason = "test");
        crate::log_context_event!(info, "broker", "context event", "ctx#1");
    }
}
