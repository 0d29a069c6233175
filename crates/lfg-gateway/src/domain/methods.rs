//! Supported-method registry, consulted by the router and exposed at
//! `GET /methods` when reflection is enabled.

/// Unary methods served on the HTTP endpoint.
pub const UNARY_METHODS: &[&str] = &[
    "lfg_createGroup",
    "lfg_updateGroup",
    "lfg_deleteGroup",
    "lfg_listGroups",
    "lfg_createGroupApplication",
    "lfg_deleteGroupApplication",
    "lfg_listGroupApplications",
    "lfg_heartbeat",
];

/// Streaming methods served on the WebSocket endpoint.
pub const STREAMING_METHODS: &[&str] = &["lfg_subscribeGroups", "lfg_subscribeGroupApplications"];

/// Whether `method` is part of the service surface.
pub fn is_method_supported(method: &str) -> bool {
    UNARY_METHODS.contains(&method) || STREAMING_METHODS.contains(&method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_are_supported() {
        assert!(is_method_supported("lfg_createGroup"));
        assert!(is_method_supported("lfg_subscribeGroups"));
    }

    #[test]
    fn unknown_methods_are_not() {
        assert!(!is_method_supported("lfg_banPlayer"));
        assert!(!is_method_supported(""));
    }
}
