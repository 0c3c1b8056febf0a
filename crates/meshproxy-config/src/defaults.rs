//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `meshproxy_core::defaults`.

use meshproxy_core::defaults;

/// Generate default value functions that forward to meshproxy_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_directory_timeout_secs    => DEFAULT_DIRECTORY_TIMEOUT_SECS: u64,
    default_bucket_retry_delay_ms     => DEFAULT_BUCKET_RETRY_DELAY_MS: u64,
    default_stream_open_timeout_secs  => DEFAULT_STREAM_OPEN_TIMEOUT_SECS: u64,
    default_splice_buffer_size        => DEFAULT_SPLICE_BUFFER_SIZE: usize,
    min_splice_buffer_size            => MIN_SPLICE_BUFFER_SIZE: usize,
    max_splice_buffer_size            => MAX_SPLICE_BUFFER_SIZE: usize,
    default_max_streams               => DEFAULT_MAX_STREAMS: usize,
    max_max_streams                   => MAX_MAX_STREAMS: usize,
    // TCP socket options
    default_tcp_no_delay              => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs        => DEFAULT_TCP_KEEPALIVE_SECS: u64,
}

default_string_fns! {
    default_topic         => DEFAULT_TOPIC,
    default_directory_rpc => DEFAULT_DIRECTORY_RPC,
}
