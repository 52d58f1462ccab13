use super::*;

fn raw(entries: &[(&str, Option<&str>, Option<&str>)]) -> RawEndpoints {
    let mut raw = RawEndpoints::new();
    for (name, id, secret) in entries {
        raw.push(
            *name,
            RawEndpoint {
                client_id: id.map(str::to_string),
                client_secret: secret.map(str::to_string),
                default: false,
            },
        );
    }
    raw
}

#[test]
fn test_empty_config_is_rejected() {
    let err = EndpointRegistry::normalize(&RawEndpoints::new()).unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}

#[test]
fn test_empty_secret_is_dropped_and_registry_fails() {
    let raw = raw(&[("a", Some("x"), Some(""))]);
    assert!(EndpointRegistry::normalize(&raw).is_err());
}

#[test]
fn test_incomplete_entries_are_dropped() {
    let raw = raw(&[
        ("missing-secret", Some("x"), None),
        ("missing-id", None, Some("y")),
        ("empty-id", Some(""), Some("y")),
        ("login.example.com", Some("id"), Some("secret")),
    ]);

    let registry = EndpointRegistry::normalize(&raw).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.lookup("missing-secret").is_none());
    assert_eq!(
        registry.lookup("login.example.com").unwrap().credentials.client_id,
        "id"
    );
}

#[test]
fn test_first_surviving_entry_is_default() {
    let raw = raw(&[
        ("broken", Some("x"), None),
        ("second.example.com", Some("id2"), Some("s2")),
        ("third.example.com", Some("id3"), Some("s3")),
    ]);

    let registry = EndpointRegistry::normalize(&raw).unwrap();
    assert_eq!(
        registry.default_endpoint().tenant.as_str(),
        "second.example.com"
    );
}

#[test]
fn test_explicit_default_wins() {
    let mut raw = raw(&[("first", Some("id1"), Some("s1"))]);
    raw.push(
        "second",
        RawEndpoint {
            default: true,
            ..RawEndpoint::new("id2", "s2")
        },
    );

    let registry = EndpointRegistry::normalize(&raw).unwrap();
    assert_eq!(registry.default_endpoint().tenant.as_str(), "second");
}

#[test]
fn test_resolve_falls_back_to_default() {
    let raw = raw(&[
        ("login.example.com", Some("id1"), Some("s1")),
        ("test.example.com", Some("id2"), Some("s2")),
    ]);
    let registry = EndpointRegistry::normalize(&raw).unwrap();

    assert_eq!(
        registry.resolve(Some("test.example.com")).tenant.as_str(),
        "test.example.com"
    );
    assert_eq!(
        registry.resolve(Some("bogus.example.com")).tenant.as_str(),
        "login.example.com"
    );
    assert_eq!(registry.resolve(None).tenant.as_str(), "login.example.com");
}

#[test]
fn test_lookup_is_strict() {
    let raw = raw(&[("login.example.com", Some("id1"), Some("s1"))]);
    let registry = EndpointRegistry::normalize(&raw).unwrap();

    assert!(registry.lookup("bogus.example.com").is_none());
    assert!(registry.lookup("").is_none());
}

#[test]
fn test_duplicate_tenant_keeps_first() {
    let raw = raw(&[
        ("login.example.com", Some("id1"), Some("s1")),
        (" login.example.com ", Some("id2"), Some("s2")),
    ]);
    let registry = EndpointRegistry::normalize(&raw).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.lookup("login.example.com").unwrap().credentials.client_id,
        "id1"
    );
}

#[test]
fn test_non_table_values_are_dropped() {
    let toml = r#"
        bogus = "not-a-table"

        [real]
        client_id = "id"
        client_secret = "secret"
    "#;
    let raw: RawEndpoints = toml::from_str(toml).unwrap();
    assert_eq!(raw.len(), 2);

    let registry = EndpointRegistry::normalize(&raw).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.default_endpoint().tenant.as_str(), "real");
}

#[test]
fn test_credentials_debug_redacts_secret() {
    let creds = ClientCredentials {
        client_id: "id".to_string(),
        client_secret: "super-secret".to_string(),
    };
    let rendered = format!("{:?}", creds);
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("<redacted>"));
}
