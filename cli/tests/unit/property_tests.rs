//! Property-based tests for validation and naming logic.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use kmachine_cli::domain::config::{
    KmachineConfig, SELECTABLE_DRIVERS, VALID_CONFIG_KEYS, parse_size_mb, validate_config_key,
    validate_config_value,
};
use kmachine_cli::domain::engine::engine_port;
use kmachine_cli::domain::node::{machine_name, next_node_name};

proptest! {
    /// Keys outside the whitelist are rejected.
    #[test]
    fn prop_unknown_keys_rejected(key in "[a-z]{1,12}(-[a-z]{1,8})?") {
        if !VALID_CONFIG_KEYS.contains(&key.as_str()) {
            prop_assert!(validate_config_key(&key).is_err(), "accepted invalid key: {key}");
        }
    }

    /// Only registered drivers can be selected.
    #[test]
    fn prop_arbitrary_driver_rejected(value in "[a-z]{1,15}") {
        let valid = SELECTABLE_DRIVERS.contains(&value.as_str());
        prop_assert_eq!(validate_config_value("driver", &value).is_ok(), valid);
    }

    /// Numeric settings accept exactly the positive integers.
    #[test]
    fn prop_numeric_settings_accept_positive_only(n in 0u32..100_000) {
        for key in ["cpus", "memory", "disk-size", "command-timeout"] {
            prop_assert_eq!(validate_config_value(key, &n.to_string()).is_ok(), n > 0);
        }
    }

    /// Set then get returns the value for every numeric key.
    #[test]
    fn prop_set_get_numeric(n in 1u32..100_000) {
        let mut config = KmachineConfig::default();
        for key in ["cpus", "memory", "disk-size", "command-timeout"] {
            config.set(key, &n.to_string()).expect("valid value");
            prop_assert_eq!(config.get(key), Some(n.to_string()));
        }
    }

    /// A gibibyte suffix is worth 1024 MB in any spelling.
    #[test]
    fn prop_gib_sizes_scale_by_1024(n in 1u32..4096, unit in "(g|G|gb|GB|gib|GiB)") {
        let size = format!("{n}{unit}");
        let mb = parse_size_mb(&size).expect("valid size");
        prop_assert_eq!(mb, n * 1024);
    }

    /// Node machines are always prefixed by their cluster.
    #[test]
    fn prop_machine_name_prefixed_by_cluster(
        cluster in "[a-z][a-z0-9]{0,10}",
        existing in 0usize..50,
    ) {
        let node = next_node_name(existing);
        let name = machine_name(&cluster, &node);
        let expected = format!("{cluster}-");
        prop_assert!(name.starts_with(&expected));
        let suffix = format!("node-{}", existing + 1);
        prop_assert!(name.ends_with(&suffix));
    }

    /// The daemon port is parsed from any tcp URL.
    #[test]
    fn prop_engine_port_from_url(a in 1u8..255, b in 0u8..255, port in 1u16..65535) {
        let url = format!("tcp://{a}.{b}.0.1:{port}");
        prop_assert_eq!(engine_port(&url).expect("valid url"), port);
    }
}
