//! Configuration loading, validation and CLI overrides.
//!
//! The on-disk format is a JSON object with PascalCase keys:
//!
//! ```json
//! {
//!   "Listener": "127.0.0.1:8080",
//!   "NodeDialTimeout": 5,
//!   "PrivateKey": "…"
//! }
//! ```
//!
//! Every other section is optional and falls back to the values in
//! `meshproxy_core::defaults`. Files ending in `.yaml`/`.yml` or `.toml` are
//! read in that syntax instead; any other name is read as JSON with comments.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::validate_config;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Config {
        serde_json::from_str(
            r#"{"Listener": "127.0.0.1:9000", "NodeDialTimeout": 2, "PrivateKey": "k"}"#,
        )
        .unwrap()
    }

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_json_config() {
        let file = write_temp(
            ".json",
            r#"{"Listener": "127.0.0.1:8080", "NodeDialTimeout": 5, "PrivateKey": "abc"}"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.listener, "127.0.0.1:8080");
        assert_eq!(cfg.node_dial_timeout, 5);
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn load_jsonc_strips_comments() {
        let file = write_temp(
            ".jsonc",
            r#"{
                // local side
                "Listener": "127.0.0.1:8080",
                "NodeDialTimeout": 5, /* seconds */
                "PrivateKey": "abc"
            }"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.node_dial_timeout, 5);
    }

    #[test]
    fn load_toml_config() {
        let file = write_temp(
            ".toml",
            r#"
Listener = "127.0.0.1:8080"
NodeDialTimeout = 3
PrivateKey = "abc"
Topic = "relays"

[Directory]
Rpc = "https://seed.example:30003"
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.topic, "relays");
        assert_eq!(cfg.directory.rpc, "https://seed.example:30003");
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn load_unknown_extension_as_json() {
        let file = write_temp(
            ".conf",
            r#"{
                // relay side
                "Listener": "127.0.0.1:8080", "NodeDialTimeout": 0, "PrivateKey": "abc"
            }"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.listener, "127.0.0.1:8080");
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn load_extensionless_file_as_json() {
        let mut file = tempfile::Builder::new()
            .prefix("relay")
            .suffix("")
            .tempfile()
            .unwrap();
        file.write_all(br#"{"Listener": "127.0.0.1:8080", "NodeDialTimeout": 4, "PrivateKey": "abc"}"#)
            .unwrap();
        assert!(file.path().extension().is_none());

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.node_dial_timeout, 4);

        let file = write_temp("", "Listener = 1");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let file = write_temp(".json", "{\"Listener\": ");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            load_config("/nonexistent/meshproxy/config.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = sample();
        cfg.private_key = PrivateKey::new("  ");
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.listener = String::new();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.directory.rpc = "seed.example:30003".into();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.session.buffer_size = 16;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.session.max_streams = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.metrics.listen = Some("not-an-addr".into());
        assert!(validate_config(&cfg).is_err());

        let mut cfg = sample();
        cfg.logging.format = Some("xml".into());
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn validate_accepts_unbounded_dial_timeout() {
        let mut cfg = sample();
        cfg.node_dial_timeout = 0;
        validate_config(&cfg).unwrap();
        assert!(cfg.dial_timeout().is_none());
    }

    #[test]
    fn overrides_replace_fields() {
        let mut cfg = sample();
        let overrides = CliOverrides {
            listen: Some("0.0.0.0:1080".into()),
            node_dial_timeout: Some(9),
            topic: Some("other".into()),
            directory: Some("http://127.0.0.1:1".into()),
            log_level: Some("debug".into()),
            ..Default::default()
        };
        apply_overrides(&mut cfg, &overrides);
        assert_eq!(cfg.listener, "0.0.0.0:1080");
        assert_eq!(cfg.node_dial_timeout, 9);
        assert_eq!(cfg.private_key.expose(), "k");
        assert_eq!(cfg.topic, "other");
        assert_eq!(cfg.directory.rpc, "http://127.0.0.1:1");
        assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
    }
}
