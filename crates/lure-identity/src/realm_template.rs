//! Realm-creation payload for a new tenant
//!
//! [`RealmBlueprint::build`] is a pure function of its inputs: identical
//! blueprints serialize to identical payloads (maps are ordered).

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::representations::{ClientScopeRepresentation, ProtocolMapperRepresentation};
use crate::roles::{RealmRole, REALM_ADMIN_ROLE, REALM_MANAGEMENT_CLIENT};

pub const FEATURE_FLAGS_SCOPE: &str = "realm-feature-flags";
pub const FEATURE_CLAIM_PREFIX: &str = "features.";
pub const TENANT_DOMAIN_ATTRIBUTE: &str = "tenant-domain";
pub const TENANT_LOGO_ID_ATTRIBUTE: &str = "tenant-logo-id";
pub const TENANT_LOGO_UPDATED_AT_ATTRIBUTE: &str = "tenant-logo-updated-at";

pub const WEB_CLIENT_ID: &str = "react-app";
pub const ORG_MANAGER_RESOURCE: &str = "org_manager";
pub const ORG_MANAGER_RESOURCE_URI: &str = "/api/org-manager/*";
pub const ORG_MANAGER_POLICY: &str = "org-manager-role-policy";
pub const ORG_MANAGER_PERMISSION: &str = "org-manager-permission";

/// Events are kept for seven days.
pub const EVENTS_EXPIRATION_SECONDS: u64 = 7 * 24 * 60 * 60;

pub const ENABLED_EVENT_TYPES: &[&str] = &[
    "LOGIN",
    "LOGIN_ERROR",
    "LOGOUT",
    "LOGOUT_ERROR",
    "CODE_TO_TOKEN",
    "CODE_TO_TOKEN_ERROR",
    "REFRESH_TOKEN",
    "REFRESH_TOKEN_ERROR",
    "CLIENT_LOGIN",
    "CLIENT_LOGIN_ERROR",
    "PERMISSION_TOKEN",
    "PERMISSION_TOKEN_ERROR",
    "UPDATE_PASSWORD",
    "UPDATE_PASSWORD_ERROR",
    "RESET_PASSWORD",
    "RESET_PASSWORD_ERROR",
    "SEND_RESET_PASSWORD",
    "UPDATE_PROFILE",
    "UPDATE_PROFILE_ERROR",
    "VERIFY_EMAIL",
];

/// Client scopes assigned to every client by default.
pub const DEFAULT_CLIENT_SCOPES: &[&str] = &["acr", "basic", "email", "profile", "roles", "web-origins"];

/// Client scopes clients may request.
pub const OPTIONAL_CLIENT_SCOPES: &[&str] = &[
    "address",
    "microprofile-jwt",
    "offline_access",
    "organization",
    "phone",
];

/// Everything needed to provision one tenant realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmBlueprint {
    pub realm_name: String,
    pub admin_email: String,
    pub domain: String,
    pub features: BTreeMap<String, bool>,
    /// Temporary password of the bootstrap org manager.
    pub admin_temporary_password: String,
    /// Public URL of the web application, used for redirect URIs.
    pub app_url: String,
    /// Client id of the confidential API client.
    pub api_client_id: String,
}

impl RealmBlueprint {
    pub fn build(&self) -> Value {
        let mut default_scopes: Vec<&str> = DEFAULT_CLIENT_SCOPES.to_vec();
        if !self.features.is_empty() {
            default_scopes.push(FEATURE_FLAGS_SCOPE);
        }

        let mut client_scopes = oidc_client_scopes();
        client_scopes.push(feature_flags_scope(&self.features));

        json!({
            "realm": self.realm_name,
            "displayName": self.realm_name,
            "enabled": true,
            "registrationAllowed": false,
            "loginWithEmailAllowed": true,
            "duplicateEmailsAllowed": false,
            "resetPasswordAllowed": true,
            "attributes": { TENANT_DOMAIN_ATTRIBUTE: self.domain },
            "eventsEnabled": true,
            "eventsExpiration": EVENTS_EXPIRATION_SECONDS,
            "eventsListeners": ["jboss-logging"],
            "enabledEventTypes": ENABLED_EVENT_TYPES,
            "adminEventsEnabled": true,
            "adminEventsDetailsEnabled": true,
            "roles": {
                "realm": RealmRole::ALL
                    .iter()
                    .map(|role| json!({ "name": role.as_str(), "description": role.description() }))
                    .collect::<Vec<_>>(),
            },
            "clientScopes": client_scopes,
            "defaultDefaultClientScopes": default_scopes,
            "defaultOptionalClientScopes": OPTIONAL_CLIENT_SCOPES,
            "clients": [self.web_client(), self.api_client()],
            "users": [self.bootstrap_user()],
        })
    }

    fn web_client(&self) -> Value {
        let app_url = self.app_url.trim_end_matches('/');
        json!({
            "clientId": WEB_CLIENT_ID,
            "name": "Web application",
            "enabled": true,
            "publicClient": true,
            "standardFlowEnabled": true,
            "directAccessGrantsEnabled": false,
            "redirectUris": [format!("{}/*", app_url)],
            "webOrigins": [app_url],
            "attributes": {
                "pkce.code.challenge.method": "S256",
                "post.logout.redirect.uris": "+",
            },
            "protocolMappers": [{
                "name": format!("{}-audience", self.api_client_id),
                "protocol": "openid-connect",
                "protocolMapper": "oidc-audience-mapper",
                "config": {
                    "included.client.audience": self.api_client_id,
                    "id.token.claim": "false",
                    "access.token.claim": "true",
                    "introspection.token.claim": "true",
                },
            }],
        })
    }

    fn api_client(&self) -> Value {
        let role_binding = json!([{ "id": RealmRole::OrgManager.as_str(), "required": true }]);
        json!({
            "clientId": self.api_client_id,
            "name": "Lure API",
            "enabled": true,
            "publicClient": false,
            "bearerOnly": false,
            "standardFlowEnabled": false,
            "directAccessGrantsEnabled": false,
            "serviceAccountsEnabled": true,
            "authorizationServicesEnabled": true,
            "authorizationSettings": {
                "allowRemoteResourceManagement": false,
                "policyEnforcementMode": "ENFORCING",
                "decisionStrategy": "UNANIMOUS",
                "scopes": [{ "name": "view" }, { "name": "manage" }],
                "resources": [{
                    "name": ORG_MANAGER_RESOURCE,
                    "type": format!("urn:{}:resources:{}", self.api_client_id, ORG_MANAGER_RESOURCE),
                    "ownerManagedAccess": false,
                    "uris": [ORG_MANAGER_RESOURCE_URI],
                    "scopes": [{ "name": "view" }, { "name": "manage" }],
                }],
                "policies": [
                    {
                        "name": ORG_MANAGER_POLICY,
                        "type": "role",
                        "logic": "POSITIVE",
                        "decisionStrategy": "UNANIMOUS",
                        // Keycloak expects policy config values as JSON strings.
                        "config": { "roles": role_binding.to_string() },
                    },
                    {
                        "name": ORG_MANAGER_PERMISSION,
                        "type": "resource",
                        "logic": "POSITIVE",
                        "decisionStrategy": "UNANIMOUS",
                        "config": {
                            "resources": json!([ORG_MANAGER_RESOURCE]).to_string(),
                            "applyPolicies": json!([ORG_MANAGER_POLICY]).to_string(),
                        },
                    },
                ],
            },
        })
    }

    fn bootstrap_user(&self) -> Value {
        json!({
            "username": self.admin_email,
            "email": self.admin_email,
            "enabled": true,
            "emailVerified": true,
            "credentials": [{
                "type": "password",
                "value": self.admin_temporary_password,
                "temporary": true,
            }],
            "requiredActions": ["UPDATE_PASSWORD"],
            "realmRoles": [RealmRole::OrgManager.as_str()],
            "clientRoles": { REALM_MANAGEMENT_CLIENT: [REALM_ADMIN_ROLE] },
        })
    }
}

/// Hardcoded-claim mapper publishing one feature flag into issued tokens.
pub fn feature_mapper(feature: &str, enabled: bool) -> ProtocolMapperRepresentation {
    let config = [
        ("claim.name", format!("{}{}", FEATURE_CLAIM_PREFIX, feature)),
        ("claim.value", enabled.to_string()),
        ("jsonType.label", "String".to_string()),
        ("id.token.claim", "true".to_string()),
        ("access.token.claim", "true".to_string()),
        ("userinfo.token.claim", "true".to_string()),
        ("introspection.token.claim", "true".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    ProtocolMapperRepresentation {
        id: None,
        name: format!("feature-{}", feature),
        protocol: "openid-connect".to_string(),
        protocol_mapper: "oidc-hardcoded-claim-mapper".to_string(),
        config,
    }
}

/// Inverse of [`feature_mapper`]: read feature flags back from a scope.
pub fn features_from_scope(scope: &ClientScopeRepresentation) -> BTreeMap<String, bool> {
    scope
        .protocol_mappers
        .iter()
        .filter_map(|mapper| {
            let claim = mapper.config.get("claim.name")?;
            let feature = claim.strip_prefix(FEATURE_CLAIM_PREFIX)?;
            let value = mapper.config.get("claim.value")?;
            Some((feature.to_string(), value.eq_ignore_ascii_case("true")))
        })
        .collect()
}

fn feature_flags_scope(features: &BTreeMap<String, bool>) -> Value {
    let mappers: Vec<ProtocolMapperRepresentation> = features
        .iter()
        .map(|(feature, enabled)| feature_mapper(feature, *enabled))
        .collect();
    json!({
        "name": FEATURE_FLAGS_SCOPE,
        "description": "Tenant feature flags published as token claims",
        "protocol": "openid-connect",
        "attributes": {
            "include.in.token.scope": "false",
            "display.on.consent.screen": "false",
        },
        "protocolMappers": mappers,
    })
}

fn claims(id: bool, access: bool, userinfo: bool) -> [(&'static str, &'static str); 4] {
    let flag = |b: bool| if b { "true" } else { "false" };
    [
        ("id.token.claim", flag(id)),
        ("access.token.claim", flag(access)),
        ("userinfo.token.claim", flag(userinfo)),
        ("introspection.token.claim", "true"),
    ]
}

fn mapper(name: &str, kind: &str, extra: &[(&str, &str)], tokens: [(&str, &str); 4]) -> Value {
    let config: BTreeMap<&str, &str> = extra.iter().copied().chain(tokens).collect();
    json!({
        "name": name,
        "protocol": "openid-connect",
        "protocolMapper": kind,
        "consentRequired": false,
        "config": config,
    })
}

fn user_attribute(name: &str, attribute: &str, claim: &str, json_type: &str) -> Value {
    mapper(
        name,
        "oidc-usermodel-attribute-mapper",
        &[
            ("user.attribute", attribute),
            ("claim.name", claim),
            ("jsonType.label", json_type),
        ],
        claims(true, true, true),
    )
}

fn user_property(name: &str, property: &str, claim: &str, json_type: &str) -> Value {
    mapper(
        name,
        "oidc-usermodel-property-mapper",
        &[
            ("user.attribute", property),
            ("claim.name", claim),
            ("jsonType.label", json_type),
        ],
        claims(true, true, true),
    )
}

fn scope(name: &str, consent_text: Option<&str>, in_token_scope: bool, mappers: Vec<Value>) -> Value {
    let mut attributes = json!({
        "include.in.token.scope": in_token_scope.to_string(),
        "display.on.consent.screen": consent_text.is_some().to_string(),
    });
    if let Some(text) = consent_text {
        attributes["consent.screen.text"] = json!(text);
    }
    json!({
        "name": name,
        "protocol": "openid-connect",
        "attributes": attributes,
        "protocolMappers": mappers,
    })
}

/// Keycloak's stock OpenID Connect client scopes with their canonical mappers.
fn oidc_client_scopes() -> Vec<Value> {
    vec![
        scope(
            "acr",
            None,
            false,
            vec![mapper("acr loa level", "oidc-acr-mapper", &[], claims(true, true, false))],
        ),
        scope(
            "address",
            Some("${addressScopeConsentText}"),
            true,
            vec![mapper(
                "address",
                "oidc-address-mapper",
                &[
                    ("user.attribute.formatted", "formatted"),
                    ("user.attribute.country", "country"),
                    ("user.attribute.postal_code", "postal_code"),
                    ("user.attribute.street", "street"),
                    ("user.attribute.region", "region"),
                    ("user.attribute.locality", "locality"),
                ],
                claims(true, true, true),
            )],
        ),
        scope(
            "basic",
            None,
            false,
            vec![
                mapper("sub", "oidc-sub-mapper", &[], claims(false, true, false)),
                mapper(
                    "auth_time",
                    "oidc-usersessionmodel-note-mapper",
                    &[
                        ("user.session.note", "AUTH_TIME"),
                        ("claim.name", "auth_time"),
                        ("jsonType.label", "long"),
                    ],
                    claims(true, true, false),
                ),
            ],
        ),
        scope(
            "email",
            Some("${emailScopeConsentText}"),
            true,
            vec![
                user_property("email", "email", "email", "String"),
                user_property("email verified", "emailVerified", "email_verified", "boolean"),
            ],
        ),
        scope(
            "microprofile-jwt",
            None,
            true,
            vec![
                user_property("upn", "username", "upn", "String"),
                mapper(
                    "groups",
                    "oidc-usermodel-realm-role-mapper",
                    &[
                        ("multivalued", "true"),
                        ("claim.name", "groups"),
                        ("jsonType.label", "String"),
                    ],
                    claims(true, true, true),
                ),
            ],
        ),
        scope("offline_access", Some("${offlineAccessScopeConsentText}"), true, vec![]),
        scope(
            "organization",
            Some("${organizationScopeConsentText}"),
            true,
            vec![mapper(
                "organization",
                "oidc-organization-membership-mapper",
                &[
                    ("multivalued", "true"),
                    ("claim.name", "organization"),
                    ("jsonType.label", "String"),
                ],
                claims(true, true, false),
            )],
        ),
        scope(
            "phone",
            Some("${phoneScopeConsentText}"),
            true,
            vec![
                user_attribute("phone number", "phoneNumber", "phone_number", "String"),
                user_attribute(
                    "phone number verified",
                    "phoneNumberVerified",
                    "phone_number_verified",
                    "boolean",
                ),
            ],
        ),
        scope(
            "profile",
            Some("${profileScopeConsentText}"),
            true,
            vec![
                mapper("full name", "oidc-full-name-mapper", &[], claims(true, true, true)),
                user_property("family name", "lastName", "family_name", "String"),
                user_property("given name", "firstName", "given_name", "String"),
                user_attribute("middle name", "middleName", "middle_name", "String"),
                user_attribute("nickname", "nickname", "nickname", "String"),
                user_property("username", "username", "preferred_username", "String"),
                user_attribute("profile", "profile", "profile", "String"),
                user_attribute("picture", "picture", "picture", "String"),
                user_attribute("website", "website", "website", "String"),
                user_attribute("gender", "gender", "gender", "String"),
                user_attribute("birthdate", "birthdate", "birthdate", "String"),
                user_attribute("zoneinfo", "zoneinfo", "zoneinfo", "String"),
                user_attribute("locale", "locale", "locale", "String"),
                user_attribute("updated at", "updatedAt", "updated_at", "long"),
            ],
        ),
        scope(
            "roles",
            Some("${rolesScopeConsentText}"),
            false,
            vec![
                mapper(
                    "realm roles",
                    "oidc-usermodel-realm-role-mapper",
                    &[
                        ("multivalued", "true"),
                        ("claim.name", "realm_access.roles"),
                        ("jsonType.label", "String"),
                    ],
                    claims(false, true, false),
                ),
                mapper(
                    "client roles",
                    "oidc-usermodel-client-role-mapper",
                    &[
                        ("multivalued", "true"),
                        ("claim.name", "resource_access.${client_id}.roles"),
                        ("jsonType.label", "String"),
                    ],
                    claims(false, true, false),
                ),
                mapper(
                    "audience resolve",
                    "oidc-audience-resolve-mapper",
                    &[],
                    claims(false, true, false),
                ),
            ],
        ),
        json!({
            "name": "role_list",
            "description": "SAML role list",
            "protocol": "saml",
            "attributes": {
                "consent.screen.text": "${samlRoleListScopeConsentText}",
                "display.on.consent.screen": "true",
            },
            "protocolMappers": [{
                "name": "role list",
                "protocol": "saml",
                "protocolMapper": "saml-role-list-mapper",
                "consentRequired": false,
                "config": {
                    "single": "false",
                    "attribute.nameformat": "Basic",
                    "attribute.name": "Role",
                },
            }],
        }),
        scope(
            "web-origins",
            None,
            false,
            vec![mapper(
                "allowed web origins",
                "oidc-allowed-origins-mapper",
                &[],
                claims(false, true, false),
            )],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(features: &[(&str, bool)]) -> RealmBlueprint {
        RealmBlueprint {
            realm_name: "acme".into(),
            admin_email: "boss@acme.test".into(),
            domain: "acme.test".into(),
            features: features
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            admin_temporary_password: "Temp-Passw0rd!".into(),
            app_url: "https://app.lure.test".into(),
            api_client_id: "api".into(),
        }
    }

    fn scope_named<'a>(payload: &'a Value, name: &str) -> &'a Value {
        payload["clientScopes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == name)
            .unwrap_or_else(|| panic!("missing scope {}", name))
    }

    #[test]
    fn test_build_is_deterministic() {
        let bp = blueprint(&[("phishing", true), ("lms", false)]);
        assert_eq!(bp.build().to_string(), bp.build().to_string());
    }

    #[test]
    fn test_feature_mappers_round_trip() {
        let payload = blueprint(&[("phishing", true), ("lms", false)]).build();
        let scope: ClientScopeRepresentation =
            serde_json::from_value(scope_named(&payload, FEATURE_FLAGS_SCOPE).clone()).unwrap();

        let features = features_from_scope(&scope);
        assert_eq!(features.get("phishing"), Some(&true));
        assert_eq!(features.get("lms"), Some(&false));

        let mapper = &scope.protocol_mappers[0];
        assert_eq!(mapper.protocol_mapper, "oidc-hardcoded-claim-mapper");
        assert_eq!(mapper.config["userinfo.token.claim"], "true");
    }

    #[test]
    fn test_feature_scope_is_default_only_with_features() {
        let with = blueprint(&[("phishing", true)]).build();
        let without = blueprint(&[]).build();
        let contains = |p: &Value| {
            p["defaultDefaultClientScopes"]
                .as_array()
                .unwrap()
                .iter()
                .any(|s| s == FEATURE_FLAGS_SCOPE)
        };
        assert!(contains(&with));
        assert!(!contains(&without));
    }

    #[test]
    fn test_stock_scopes_are_present() {
        let payload = blueprint(&[]).build();
        for name in [
            "acr",
            "address",
            "basic",
            "email",
            "microprofile-jwt",
            "offline_access",
            "organization",
            "phone",
            "profile",
            "roles",
            "role_list",
            "web-origins",
        ] {
            scope_named(&payload, name);
        }
    }

    #[test]
    fn test_realm_settings() {
        let payload = blueprint(&[]).build();
        assert_eq!(payload["attributes"][TENANT_DOMAIN_ATTRIBUTE], "acme.test");
        assert_eq!(payload["eventsEnabled"], true);
        assert_eq!(payload["eventsExpiration"], 604800);

        let roles: Vec<&str> = payload["roles"]["realm"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["ORG_MANAGER", "CONTENT_MANAGER", "DEFAULT_USER"]);
    }

    #[test]
    fn test_api_client_authorization() {
        let payload = blueprint(&[]).build();
        let api = &payload["clients"][1];
        assert_eq!(api["clientId"], "api");
        assert_eq!(api["publicClient"], false);

        let settings = &api["authorizationSettings"];
        let resource = &settings["resources"][0];
        assert_eq!(resource["name"], ORG_MANAGER_RESOURCE);
        assert_eq!(resource["uris"][0], ORG_MANAGER_RESOURCE_URI);

        let permission = &settings["policies"][1];
        assert_eq!(permission["decisionStrategy"], "UNANIMOUS");
        assert!(permission["config"]["applyPolicies"]
            .as_str()
            .unwrap()
            .contains(ORG_MANAGER_POLICY));

        let web = &payload["clients"][0];
        assert_eq!(web["publicClient"], true);
        assert_eq!(
            web["protocolMappers"][0]["config"]["included.client.audience"],
            "api"
        );
    }

    #[test]
    fn test_bootstrap_user() {
        let payload = blueprint(&[]).build();
        let user = &payload["users"][0];
        assert_eq!(user["email"], "boss@acme.test");
        assert_eq!(user["credentials"][0]["temporary"], true);
        assert_eq!(user["requiredActions"][0], "UPDATE_PASSWORD");
        assert_eq!(user["realmRoles"][0], "ORG_MANAGER");
        assert_eq!(user["clientRoles"]["realm-management"][0], "realm-admin");
    }
}
