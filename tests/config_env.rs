/// Environment-driven configuration tests
///
/// These mutate process environment variables, so they run serially.

use ferrous_scopes::{ScopeConfig, ScopeError, SessionScope};
use serial_test::serial;
use std::env;

const VARS: [&str; 3] = [
    "FERROUS_SCOPES_INITIAL_CAPACITY",
    "FERROUS_SCOPES_PURGE_INTERVAL",
    "FERROUS_SCOPES_TRACE_CACHE_HITS",
];

fn clear_vars() {
    for var in VARS {
        env::remove_var(var);
    }
    for suffix in ["INITIAL_CAPACITY", "PURGE_INTERVAL", "TRACE_CACHE_HITS"] {
        env::remove_var(format!("MYAPP_{}", suffix));
    }
}

#[test]
#[serial]
fn test_unset_variables_keep_defaults() {
    clear_vars();
    assert_eq!(ScopeConfig::from_env().unwrap(), ScopeConfig::default());
}

#[test]
#[serial]
fn test_variables_override_defaults() {
    clear_vars();
    env::set_var("FERROUS_SCOPES_INITIAL_CAPACITY", "128");
    env::set_var("FERROUS_SCOPES_PURGE_INTERVAL", " 8 ");
    env::set_var("FERROUS_SCOPES_TRACE_CACHE_HITS", "yes");

    let config = ScopeConfig::from_env().unwrap();
    clear_vars();

    assert_eq!(config.initial_capacity, 128);
    assert_eq!(config.purge_interval, 8);
    assert!(config.trace_cache_hits);

    let scope = SessionScope::with_config(config.clone());
    assert_eq!(scope.config(), &config);
}

#[test]
#[serial]
fn test_custom_prefix() {
    clear_vars();
    env::set_var("MYAPP_PURGE_INTERVAL", "3");
    env::set_var("FERROUS_SCOPES_PURGE_INTERVAL", "99");

    let config = ScopeConfig::from_env_with_prefix("myapp").unwrap();
    clear_vars();

    assert_eq!(config.purge_interval, 3);
}

#[test]
#[serial]
fn test_malformed_values_are_rejected() {
    clear_vars();
    env::set_var("FERROUS_SCOPES_PURGE_INTERVAL", "often");
    let bad_number = ScopeConfig::from_env();
    clear_vars();

    env::set_var("FERROUS_SCOPES_TRACE_CACHE_HITS", "perhaps");
    let bad_flag = ScopeConfig::from_env();
    clear_vars();

    env::set_var("FERROUS_SCOPES_INITIAL_CAPACITY", "99999999999");
    let too_large = ScopeConfig::from_env();
    clear_vars();

    for result in [bad_number, bad_flag, too_large] {
        match result {
            Err(ScopeError::Config(message)) => assert!(!message.is_empty()),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}
