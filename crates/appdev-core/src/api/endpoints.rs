//! Remote API paths.

pub const SERVER_VERSION: &str = "/api/system/about?fields=external_version";

pub const APPLICATIONS: &str = "/api/gui_app_framework/applications";
pub const APPLICATION_INSTALL: &str = "/api/gui_app_framework/application_creation_task";
pub const DEFINITIONS: &str = "/api/gui_app_framework/application_definitions";
pub const DEVELOPER_APPLICATIONS: &str = "/api/gui_app_framework/developer/applications";
pub const USERS_WITH_CAPABILITIES: &str = "/api/config/access/users_with_capability_filter";

pub fn application(app_id: &str) -> String {
    format!("{APPLICATIONS}/{app_id}")
}

pub fn application_definition_id(app_id: &str) -> String {
    format!("{APPLICATIONS}/{app_id}?fields=application_definition_id")
}

pub fn install_status(app_id: &str) -> String {
    format!("{APPLICATION_INSTALL}/{app_id}")
}

pub fn install_auth(app_id: &str) -> String {
    format!("{APPLICATION_INSTALL}/{app_id}/auth")
}

pub fn install_cancel(app_id: &str) -> String {
    format!("{APPLICATION_INSTALL}/{app_id}?status=CANCELLED")
}

pub fn definition(definition_id: &str) -> String {
    format!("{DEFINITIONS}/{definition_id}")
}

pub fn developer_application(definition_id: &str) -> String {
    format!("{DEVELOPER_APPLICATIONS}/{definition_id}")
}

/// Capable-users lookup; `capabilities_json` is URL-encoded into the query.
pub fn users_with_capabilities(capabilities_json: &str) -> String {
    let encoded: String =
        url::form_urlencoded::byte_serialize(capabilities_json.as_bytes()).collect();
    format!("{USERS_WITH_CAPABILITIES}?capabilities={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_query_is_encoded() {
        assert_eq!(
            users_with_capabilities(r#"["ADMIN"]"#),
            "/api/config/access/users_with_capability_filter?capabilities=%5B%22ADMIN%22%5D"
        );
    }

    #[test]
    fn cancel_targets_the_creation_task() {
        assert_eq!(
            install_cancel("1051"),
            "/api/gui_app_framework/application_creation_task/1051?status=CANCELLED"
        );
    }
}
