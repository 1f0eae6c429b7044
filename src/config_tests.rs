// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    fn parse(args: &[&str]) -> OperatorConfig {
        let mut argv = vec![
            "subnetbind",
            "--cluster-name",
            "cluster1",
            "--backend-url",
            "https://backend.example.com",
        ];
        argv.extend_from_slice(args);
        OperatorConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.max_children_per_call, 1000);
        assert_eq!(config.gc_interval(), Duration::from_secs(600));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.metrics_addr(), "0.0.0.0:8080");
        assert_eq!(config.backend_auth(), BackendAuth::None);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_bearer_and_basic_auth() {
        let bearer = parse(&["--backend-token", "secret"]);
        assert_eq!(bearer.backend_auth(), BackendAuth::Bearer("secret".to_string()));

        let basic = parse(&["--backend-username", "admin", "--backend-password", "pw"]);
        assert_eq!(
            basic.backend_auth(),
            BackendAuth::Basic {
                username: "admin".to_string(),
                password: "pw".to_string()
            }
        );
        assert_eq!(basic.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_conflicting_or_partial_auth() {
        let both = parse(&[
            "--backend-token",
            "secret",
            "--backend-username",
            "admin",
            "--backend-password",
            "pw",
        ]);
        assert_eq!(both.validate(), Err(ConfigError::ConflictingAuth));

        let partial = parse(&["--backend-username", "admin"]);
        assert_eq!(partial.validate(), Err(ConfigError::IncompleteBasicAuth));
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = parse(&[]);
        config.backend_url = "ftp://backend".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackendUrl { .. })
        ));

        config.backend_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackendUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = parse(&["--max-children-per-call", "0"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "max-children-per-call"
            })
        );

        let config = parse(&["--gc-interval-secs", "0"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "gc-interval-secs"
            })
        );
    }

    #[test]
    fn test_rejects_blank_cluster() {
        let mut config = parse(&[]);
        config.cluster_name = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyClusterName));
    }
}
