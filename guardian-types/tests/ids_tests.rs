use guardian_types::DeviceIdentity;

#[test]
fn identity_wraps_token() {
    let id = DeviceIdentity::new("abc123");
    assert_eq!(id.as_str(), "abc123");
    assert_eq!(id.to_string(), "abc123");
}

#[test]
fn identity_from_str_and_string() {
    let a: DeviceIdentity = "abc123".into();
    let b: DeviceIdentity = String::from("abc123").into();
    assert_eq!(a, b);
}

#[test]
fn identity_equality_is_token_equality() {
    assert_eq!(DeviceIdentity::new("x"), DeviceIdentity::new("x"));
    assert_ne!(DeviceIdentity::new("x"), DeviceIdentity::new("y"));
}

#[test]
fn identity_serializes_transparently() {
    let id = DeviceIdentity::new("9KKm7qf2n9OjpI3K");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"9KKm7qf2n9OjpI3K\"");

    let parsed: DeviceIdentity = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}
