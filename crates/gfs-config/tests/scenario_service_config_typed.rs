//! Scenario: Typed Service Config
//!
//! # Invariant under test
//! - Missing keys fall back to defaults (127.0.0.1:8899, GFS_DATABASE_URL,
//!   10 connections, migrations on, no extra CORS origins).
//! - Wrong types and out-of-range values are refused with CONFIG_INVALID.
//! - The database URL is read from the env var NAMED in config.

use gfs_config::{
    load_layered_yaml_from_strings, resolve_secrets, ServiceConfig, DEFAULT_DATABASE_URL_ENV,
};

fn typed(yaml: &str) -> anyhow::Result<ServiceConfig> {
    let cfg = load_layered_yaml_from_strings(&[yaml])?;
    ServiceConfig::from_config_json(&cfg.config_json)
}

#[test]
fn empty_config_takes_defaults() {
    let cfg = typed("{}").unwrap();
    assert_eq!(cfg, ServiceConfig::default());
    assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8899");
    assert_eq!(cfg.database.url_env, DEFAULT_DATABASE_URL_ENV);
    assert_eq!(cfg.database.max_connections, 10);
    assert!(cfg.database.run_migrations);
    assert!(cfg.cors_allowed_origins.is_empty());
}

#[test]
fn explicit_values_are_read() {
    let cfg = typed(
        r#"
service:
  bind_addr: "0.0.0.0:9000"
  cors_allowed_origins: ["https://ops.example.com"]
database:
  url_env: "GFS_STAGING_DB"
  max_connections: 3
  run_migrations: false
"#,
    )
    .unwrap();
    assert_eq!(cfg.bind_addr.port(), 9000);
    assert_eq!(cfg.cors_allowed_origins, vec!["https://ops.example.com"]);
    assert_eq!(cfg.database.url_env, "GFS_STAGING_DB");
    assert_eq!(cfg.database.max_connections, 3);
    assert!(!cfg.database.run_migrations);
}

#[test]
fn invalid_values_are_refused() {
    for yaml in [
        "service:\n  bind_addr: \"not-an-addr\"\n",
        "database:\n  max_connections: 0\n",
        "database:\n  max_connections: \"ten\"\n",
        "database:\n  run_migrations: \"yes please\"\n",
        "service:\n  cors_allowed_origins: \"http://localhost\"\n",
        "database:\n  url_env: 42\n",
    ] {
        let err = typed(yaml).unwrap_err();
        assert!(
            format!("{err:#}").contains("CONFIG_INVALID"),
            "expected CONFIG_INVALID for {yaml:?}, got {err:#}"
        );
    }
}

#[test]
fn database_url_comes_from_named_env_var() {
    const VAR: &str = "GFS_TEST_SCENARIO_TYPED_DB_URL";
    let cfg = typed(&format!("database:\n  url_env: \"{VAR}\"\n")).unwrap();

    std::env::remove_var(VAR);
    let err = resolve_secrets(&cfg).unwrap_err();
    assert!(err.to_string().contains(VAR), "error names the variable");

    std::env::set_var(VAR, "postgres://gfs:pw@localhost/gfs");
    let secrets = resolve_secrets(&cfg).unwrap();
    assert_eq!(secrets.database_url, "postgres://gfs:pw@localhost/gfs");
    assert!(!format!("{secrets:?}").contains("pw@"));
    std::env::remove_var(VAR);
}
