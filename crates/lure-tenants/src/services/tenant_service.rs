//! Realm, user and group lifecycle against the identity provider
//!
//! Every mutation is applied to the identity provider first and then to the
//! local mirror. A failure after the provider succeeded leaves drift that the
//! next listing call repairs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use lure_core::{GroupDirectory, Recipient, ServiceError, ServiceResult};
use lure_entities::{groups, realms, users};
use lure_identity::realm_template::{
    FEATURE_CLAIM_PREFIX, FEATURE_FLAGS_SCOPE, TENANT_DOMAIN_ATTRIBUTE,
};
use lure_identity::{
    feature_mapper, features_from_scope, generate_temporary_password, segment,
    ClientRepresentation, ClientScopeRepresentation, GroupRepresentation, IdentityGateway,
    RealmBlueprint, RealmRepresentation, RealmRole, RoleRepresentation, UserRepresentation,
    REALM_ADMIN_ROLE, REALM_MANAGEMENT_CLIENT,
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::compliance_service::ComplianceService;
use super::types::{
    CreateRealmRequest, CreateUserRequest, CreatedRealm, CreatedUser, DeletedRealm, EventQuery,
    GroupSummary, RealmSummary, UserSummary,
};

/// Page size used when walking identity provider collections.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// Public URL of the web application, used for client redirect URIs.
    pub app_url: String,
    pub api_client_id: String,
    /// Realms that can never be deleted and are hidden from tenant listings.
    pub system_realms: Vec<String>,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            api_client_id: "api".to_string(),
            system_realms: vec!["master".to_string(), "platform".to_string()],
        }
    }
}

pub struct TenantService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<IdentityGateway>,
    compliance: Arc<ComplianceService>,
    config: TenantConfig,
}

impl TenantService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<IdentityGateway>,
        compliance: Arc<ComplianceService>,
        config: TenantConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            compliance,
            config,
        }
    }

    pub fn is_system_realm(&self, realm: &str) -> bool {
        self.config.system_realms.iter().any(|r| r == realm)
    }

    // ---------------------------------------------------------------------
    // Realms
    // ---------------------------------------------------------------------

    pub async fn create_realm(&self, request: CreateRealmRequest) -> ServiceResult<CreatedRealm> {
        let name = request.name.trim().to_string();
        let domain = request.domain.trim().to_lowercase();
        let admin_email = request.admin_email.trim().to_lowercase();

        validate_realm_name(&name)?;
        validate_domain(&domain)?;
        validate_email(&admin_email)?;
        for feature in request.features.keys() {
            validate_feature_name(feature)?;
        }
        if self.is_system_realm(&name) {
            return Err(ServiceError::conflict(format!("Realm '{}' is reserved", name)));
        }

        let mirrored = realms::Entity::find()
            .filter(realms::Column::Domain.eq(domain.as_str()))
            .one(self.db.as_ref())
            .await?;
        if let Some(existing) = mirrored {
            return Err(ServiceError::conflict(format!(
                "Domain {} is already mapped to realm {}",
                domain, existing.name
            )));
        }
        if let Some(existing) = self.find_realm_by_domain(&domain).await? {
            return Err(ServiceError::conflict(format!(
                "Domain {} is already mapped to realm {}",
                domain, existing.name
            )));
        }

        let temporary_password = generate_temporary_password();
        let blueprint = RealmBlueprint {
            realm_name: name.clone(),
            admin_email: admin_email.clone(),
            domain: domain.clone(),
            features: request.features.clone(),
            admin_temporary_password: temporary_password.clone(),
            app_url: self.config.app_url.clone(),
            api_client_id: self.config.api_client_id.clone(),
        };
        self.gateway.post("/admin/realms", &blueprint.build()).await?;
        info!("Created realm {} for domain {}", name, domain);

        let now = Utc::now();
        let txn = self.db.begin().await?;
        realms::Entity::insert(realms::ActiveModel {
            name: Set(name.clone()),
            domain: Set(domain.clone()),
            attributes: Set(json!({ TENANT_DOMAIN_ATTRIBUTE: domain })),
            features: Set(json!(request.features)),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(realms::Column::Name)
                .update_columns([
                    realms::Column::Domain,
                    realms::Column::Attributes,
                    realms::Column::Features,
                ])
                .to_owned(),
        )
        .exec(&txn)
        .await?;
        self.compliance.seed_defaults(&txn, &name).await?;
        txn.commit().await?;

        Ok(CreatedRealm {
            name,
            domain,
            admin_email,
            temporary_password,
            features: request.features,
        })
    }

    pub async fn delete_realm(&self, realm: &str) -> ServiceResult<DeletedRealm> {
        if self.is_system_realm(realm) {
            return Err(ServiceError::forbidden_invariant(format!(
                "System realm '{}' cannot be deleted",
                realm
            )));
        }

        let idp_users: Vec<UserRepresentation> =
            self.fetch_all(&format!("/admin/realms/{}/users", segment(realm))).await?;
        self.gateway
            .delete(&format!("/admin/realms/{}", segment(realm)), None)
            .await?;
        info!("Deleted realm {} ({} users)", realm, idp_users.len());

        let txn = self.db.begin().await?;
        users::Entity::delete_many()
            .filter(users::Column::Realm.eq(realm))
            .exec(&txn)
            .await?;
        groups::Entity::delete_many()
            .filter(groups::Column::Realm.eq(realm))
            .exec(&txn)
            .await?;
        realms::Entity::delete_by_id(realm.to_string()).exec(&txn).await?;
        txn.commit().await?;

        Ok(DeletedRealm {
            name: realm.to_string(),
            deleted_users: idp_users.len(),
        })
    }

    pub async fn list_realms(&self, exclude_system: bool) -> ServiceResult<Vec<RealmSummary>> {
        let representations: Vec<RealmRepresentation> = self.gateway.get("/admin/realms").await?;
        let mut summaries = Vec::new();

        for representation in representations {
            if exclude_system && self.is_system_realm(&representation.realm) {
                continue;
            }
            let features = self.realm_features(&representation.realm).await?;
            let summary = summarize(representation, features);
            self.mirror_realm(&summary).await?;
            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Tenant realm whose `tenant-domain` matches, ignoring case.
    pub async fn find_realm_by_domain(&self, domain: &str) -> ServiceResult<Option<RealmSummary>> {
        let representations: Vec<RealmRepresentation> = self.gateway.get("/admin/realms").await?;
        let found = representations.into_iter().find(|r| {
            r.attributes
                .get(TENANT_DOMAIN_ATTRIBUTE)
                .is_some_and(|d| d.eq_ignore_ascii_case(domain))
        });

        match found {
            Some(representation) => {
                let features = self.realm_features(&representation.realm).await?;
                Ok(Some(summarize(representation, features)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_realm(&self, realm: &str) -> ServiceResult<RealmSummary> {
        let representation: RealmRepresentation = self
            .gateway
            .get(&format!("/admin/realms/{}", segment(realm)))
            .await?;
        let features = self.realm_features(realm).await?;
        Ok(summarize(representation, features))
    }

    /// Merge keys into the realm attributes, leaving other keys untouched.
    pub async fn merge_realm_attributes(
        &self,
        realm: &str,
        updates: BTreeMap<String, String>,
    ) -> ServiceResult<BTreeMap<String, String>> {
        if updates.is_empty() {
            return Err(ServiceError::validation("No attributes to update"));
        }
        if updates
            .get(TENANT_DOMAIN_ATTRIBUTE)
            .is_some_and(|d| d.trim().is_empty())
        {
            return Err(ServiceError::validation("tenant-domain cannot be empty"));
        }

        let path = format!("/admin/realms/{}", segment(realm));
        let current: RealmRepresentation = self.gateway.get(&path).await?;
        let mut attributes = current.attributes;
        attributes.extend(updates);

        self.gateway
            .put(&path, &json!({ "realm": realm, "attributes": attributes }))
            .await?;
        debug!("Updated attributes of realm {}", realm);

        if let Some(row) = realms::Entity::find_by_id(realm.to_string())
            .one(self.db.as_ref())
            .await?
        {
            let mut model: realms::ActiveModel = row.into();
            model.attributes = Set(json!(attributes));
            if let Some(domain) = attributes.get(TENANT_DOMAIN_ATTRIBUTE) {
                model.domain = Set(domain.to_lowercase());
            }
            model.update(self.db.as_ref()).await?;
        }

        Ok(attributes)
    }

    /// Add or flip one feature flag claim in the realm's feature scope.
    pub async fn set_realm_feature(
        &self,
        realm: &str,
        feature: &str,
        enabled: bool,
    ) -> ServiceResult<BTreeMap<String, bool>> {
        validate_feature_name(feature)?;
        let scope = match self.feature_scope(realm).await? {
            Some(scope) => scope,
            None => self.create_feature_scope(realm).await?,
        };
        let scope_id = scope
            .id
            .clone()
            .ok_or_else(|| ServiceError::upstream(500, "Client scope without id"))?;
        let mappers_path = format!(
            "/admin/realms/{}/client-scopes/{}/protocol-mappers/models",
            segment(realm),
            segment(&scope_id)
        );

        let claim = format!("{}{}", FEATURE_CLAIM_PREFIX, feature);
        let existing = scope
            .protocol_mappers
            .iter()
            .find(|m| m.config.get("claim.name") == Some(&claim));

        let mut mapper = feature_mapper(feature, enabled);
        match existing.and_then(|m| m.id.clone()) {
            Some(mapper_id) => {
                mapper.id = Some(mapper_id.clone());
                mapper.name = existing.map(|m| m.name.clone()).unwrap_or(mapper.name);
                self.gateway
                    .put(
                        &format!("{}/{}", mappers_path, segment(&mapper_id)),
                        &json!(mapper),
                    )
                    .await?;
            }
            None => {
                self.gateway.post(&mappers_path, &json!(mapper)).await?;
            }
        }
        info!("Feature {} of realm {} set to {}", feature, realm, enabled);

        let mut features = features_from_scope(&scope);
        features.insert(feature.to_string(), enabled);

        if let Some(row) = realms::Entity::find_by_id(realm.to_string())
            .one(self.db.as_ref())
            .await?
        {
            let mut model: realms::ActiveModel = row.into();
            model.features = Set(json!(features));
            model.update(self.db.as_ref()).await?;
        }

        Ok(features)
    }

    pub async fn list_events(&self, realm: &str, query: &EventQuery) -> ServiceResult<Vec<Value>> {
        self.gateway
            .get(&format!(
                "/admin/realms/{}/events?{}",
                segment(realm),
                query.to_query_string()
            ))
            .await
    }

    pub async fn list_admin_events(&self, realm: &str, query: &EventQuery) -> ServiceResult<Vec<Value>> {
        self.gateway
            .get(&format!(
                "/admin/realms/{}/admin-events?{}",
                segment(realm),
                query.to_query_string()
            ))
            .await
    }

    async fn feature_scope(&self, realm: &str) -> ServiceResult<Option<ClientScopeRepresentation>> {
        let scopes: Vec<ClientScopeRepresentation> = self
            .gateway
            .get(&format!("/admin/realms/{}/client-scopes", segment(realm)))
            .await?;
        Ok(scopes.into_iter().find(|s| s.name == FEATURE_FLAGS_SCOPE))
    }

    async fn realm_features(&self, realm: &str) -> ServiceResult<BTreeMap<String, bool>> {
        Ok(self
            .feature_scope(realm)
            .await?
            .map(|scope| features_from_scope(&scope))
            .unwrap_or_default())
    }

    async fn create_feature_scope(&self, realm: &str) -> ServiceResult<ClientScopeRepresentation> {
        let response = self
            .gateway
            .post(
                &format!("/admin/realms/{}/client-scopes", segment(realm)),
                &json!({
                    "name": FEATURE_FLAGS_SCOPE,
                    "protocol": "openid-connect",
                    "attributes": {
                        "include.in.token.scope": "false",
                        "display.on.consent.screen": "false",
                    },
                }),
            )
            .await?;
        let id = response
            .created_id()
            .ok_or_else(|| ServiceError::upstream(500, "Client scope created without Location"))?;
        self.gateway
            .put(
                &format!(
                    "/admin/realms/{}/default-default-client-scopes/{}",
                    segment(realm),
                    segment(&id)
                ),
                &json!({}),
            )
            .await?;
        Ok(ClientScopeRepresentation {
            id: Some(id),
            name: FEATURE_FLAGS_SCOPE.to_string(),
            protocol_mappers: Vec::new(),
        })
    }

    async fn mirror_realm(&self, summary: &RealmSummary) -> ServiceResult<()> {
        // Realms without a tenant domain (system realms) are not mirrored.
        let Some(domain) = &summary.domain else {
            return Ok(());
        };
        let now = Utc::now();
        realms::Entity::insert(realms::ActiveModel {
            name: Set(summary.name.clone()),
            domain: Set(domain.to_lowercase()),
            attributes: Set(json!(summary.attributes)),
            features: Set(json!(summary.features)),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(realms::Column::Name)
                .update_columns([
                    realms::Column::Domain,
                    realms::Column::Attributes,
                    realms::Column::Features,
                    realms::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Tenant domain from the mirror, falling back to the identity provider.
    async fn realm_domain(&self, realm: &str) -> ServiceResult<String> {
        if let Some(row) = realms::Entity::find_by_id(realm.to_string())
            .one(self.db.as_ref())
            .await?
        {
            return Ok(row.domain);
        }

        let summary = self.get_realm(realm).await?;
        self.mirror_realm(&summary).await?;
        summary.domain.ok_or_else(|| {
            ServiceError::validation(format!("Realm {} has no tenant domain", realm))
        })
    }

    async fn realm_is_mirrored(&self, realm: &str) -> ServiceResult<bool> {
        Ok(realms::Entity::find_by_id(realm.to_string())
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn create_user(&self, realm: &str, request: CreateUserRequest) -> ServiceResult<CreatedUser> {
        let role: RealmRole = request.role.parse()?;
        let email = request.email.trim().to_lowercase();
        validate_email(&email)?;

        let domain = self.realm_domain(realm).await?;
        if !email.ends_with(&format!("@{}", domain.to_lowercase())) {
            return Err(ServiceError::validation(format!(
                "Email {} does not belong to the realm domain {}",
                email, domain
            )));
        }

        let duplicate = users::Entity::find()
            .filter(users::Column::Realm.eq(realm))
            .filter(users::Column::Email.eq(email.as_str()))
            .one(self.db.as_ref())
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::conflict(format!("User {} already exists", email)));
        }
        let existing: Vec<UserRepresentation> = self
            .gateway
            .get(&format!(
                "/admin/realms/{}/users?email={}&exact=true",
                segment(realm),
                segment(&email)
            ))
            .await?;
        if !existing.is_empty() {
            return Err(ServiceError::conflict(format!("User {} already exists", email)));
        }

        let temporary_password = generate_temporary_password();
        let response = self
            .gateway
            .post(
                &format!("/admin/realms/{}/users", segment(realm)),
                &json!({
                    "username": email,
                    "email": email,
                    "firstName": request.first_name,
                    "lastName": request.last_name,
                    "enabled": true,
                    "emailVerified": true,
                    "credentials": [{
                        "type": "password",
                        "value": temporary_password,
                        "temporary": true,
                    }],
                    "requiredActions": ["UPDATE_PASSWORD"],
                }),
            )
            .await?;
        let user_id = response
            .created_id()
            .ok_or_else(|| ServiceError::upstream(500, "User created without Location"))?;
        info!("Created user {} ({}) in realm {}", email, user_id, realm);

        self.assign_realm_role(realm, &user_id, role).await?;
        if role == RealmRole::OrgManager {
            self.set_realm_admin(realm, &user_id, true).await?;
        }
        if let Some(group_id) = &request.group_id {
            self.add_group_member(realm, group_id, &user_id).await?;
        }

        self.upsert_user_mirror(
            realm,
            &UserSummary {
                id: user_id.clone(),
                email: Some(email.clone()),
                first_name: request.first_name,
                last_name: request.last_name,
                is_org_manager: role == RealmRole::OrgManager,
            },
        )
        .await?;

        Ok(CreatedUser {
            id: user_id,
            email,
            role: role.to_string(),
            temporary_password,
        })
    }

    pub async fn delete_user(&self, realm: &str, user_id: &str) -> ServiceResult<()> {
        let roles = self.user_realm_roles(realm, user_id).await?;
        if has_role(&roles, RealmRole::OrgManager) {
            self.ensure_other_org_manager(realm, user_id).await?;
        }

        self.gateway
            .delete(
                &format!("/admin/realms/{}/users/{}", segment(realm), segment(user_id)),
                None,
            )
            .await?;
        users::Entity::delete_by_id(user_id.to_string())
            .exec(self.db.as_ref())
            .await?;
        info!("Deleted user {} from realm {}", user_id, realm);
        Ok(())
    }

    /// Replace the user's application role. Repeating the call is a no-op.
    pub async fn update_user_role(&self, realm: &str, user_id: &str, role: &str) -> ServiceResult<()> {
        let role: RealmRole = role.parse()?;
        let current = self.user_realm_roles(realm, user_id).await?;
        let was_manager = has_role(&current, RealmRole::OrgManager);

        if was_manager && role != RealmRole::OrgManager {
            self.ensure_other_org_manager(realm, user_id).await?;
        }

        let mappings_path = format!(
            "/admin/realms/{}/users/{}/role-mappings/realm",
            segment(realm),
            segment(user_id)
        );
        let to_remove: Vec<&RoleRepresentation> = current
            .iter()
            .filter(|r| RealmRole::ALL.iter().any(|known| known.as_str() == r.name))
            .filter(|r| r.name != role.as_str())
            .collect();
        if !to_remove.is_empty() {
            self.gateway.delete(&mappings_path, Some(&json!(to_remove))).await?;
        }
        if !has_role(&current, role) {
            self.assign_realm_role(realm, user_id, role).await?;
        }

        let is_manager = role == RealmRole::OrgManager;
        if is_manager != was_manager {
            self.set_realm_admin(realm, user_id, is_manager).await?;
        }

        users::Entity::update_many()
            .col_expr(users::Column::IsOrgManager, Expr::value(is_manager))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        info!("User {} of realm {} now has role {}", user_id, realm, role);
        Ok(())
    }

    /// Users of a realm; reconciles the mirror with the identity provider.
    pub async fn list_users(&self, realm: &str) -> ServiceResult<Vec<UserSummary>> {
        let representations: Vec<UserRepresentation> =
            self.fetch_all(&format!("/admin/realms/{}/users", segment(realm))).await?;
        let managers = self.org_manager_ids(realm).await?;

        let summaries: Vec<UserSummary> = representations
            .into_iter()
            .filter_map(|user| {
                let id = user.id?;
                Some(UserSummary {
                    is_org_manager: managers.contains(&id),
                    id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                })
            })
            .collect();

        if self.realm_is_mirrored(realm).await? {
            for summary in &summaries {
                self.upsert_user_mirror(realm, summary).await?;
            }
            let live: Vec<String> = summaries.iter().map(|s| s.id.clone()).collect();
            let removed = users::Entity::delete_many()
                .filter(users::Column::Realm.eq(realm))
                .filter(users::Column::Id.is_not_in(live))
                .exec(self.db.as_ref())
                .await?;
            if removed.rows_affected > 0 {
                debug!(
                    "Dropped {} stale user mirror rows of realm {}",
                    removed.rows_affected, realm
                );
            }
        } else {
            warn!("Realm {} is not mirrored; skipping user reconciliation", realm);
        }

        Ok(summaries)
    }

    async fn user_realm_roles(&self, realm: &str, user_id: &str) -> ServiceResult<Vec<RoleRepresentation>> {
        self.gateway
            .get(&format!(
                "/admin/realms/{}/users/{}/role-mappings/realm",
                segment(realm),
                segment(user_id)
            ))
            .await
    }

    async fn org_manager_ids(&self, realm: &str) -> ServiceResult<HashSet<String>> {
        let managers: Vec<UserRepresentation> = self
            .fetch_all(&format!(
                "/admin/realms/{}/roles/{}/users",
                segment(realm),
                RealmRole::OrgManager
            ))
            .await?;
        Ok(managers.into_iter().filter_map(|u| u.id).collect())
    }

    /// Refuse when `user_id` is the only organization manager left.
    async fn ensure_other_org_manager(&self, realm: &str, user_id: &str) -> ServiceResult<()> {
        let managers = self.org_manager_ids(realm).await?;
        if managers.iter().any(|id| id != user_id) {
            return Ok(());
        }
        warn!(
            "Refusing to remove the last organization manager {} of realm {}",
            user_id, realm
        );
        Err(ServiceError::forbidden_invariant(
            "A realm must keep at least one organization manager",
        ))
    }

    async fn assign_realm_role(&self, realm: &str, user_id: &str, role: RealmRole) -> ServiceResult<()> {
        let representation: RoleRepresentation = self
            .gateway
            .get(&format!("/admin/realms/{}/roles/{}", segment(realm), role))
            .await?;
        self.gateway
            .post(
                &format!(
                    "/admin/realms/{}/users/{}/role-mappings/realm",
                    segment(realm),
                    segment(user_id)
                ),
                &json!([representation]),
            )
            .await?;
        Ok(())
    }

    /// Grant or revoke `realm-management.realm-admin`.
    async fn set_realm_admin(&self, realm: &str, user_id: &str, grant: bool) -> ServiceResult<()> {
        let clients: Vec<ClientRepresentation> = self
            .gateway
            .get(&format!(
                "/admin/realms/{}/clients?clientId={}",
                segment(realm),
                REALM_MANAGEMENT_CLIENT
            ))
            .await?;
        let client = clients
            .into_iter()
            .find(|c| c.client_id == REALM_MANAGEMENT_CLIENT)
            .ok_or_else(|| ServiceError::not_found(format!("{} client", REALM_MANAGEMENT_CLIENT)))?;

        let role: RoleRepresentation = self
            .gateway
            .get(&format!(
                "/admin/realms/{}/clients/{}/roles/{}",
                segment(realm),
                segment(&client.id),
                REALM_ADMIN_ROLE
            ))
            .await?;

        let path = format!(
            "/admin/realms/{}/users/{}/role-mappings/clients/{}",
            segment(realm),
            segment(user_id),
            segment(&client.id)
        );
        if grant {
            self.gateway.post(&path, &json!([role])).await?;
        } else {
            self.gateway.delete(&path, Some(&json!([role]))).await?;
        }
        Ok(())
    }

    async fn upsert_user_mirror(&self, realm: &str, user: &UserSummary) -> ServiceResult<()> {
        if !self.realm_is_mirrored(realm).await? {
            warn!("Realm {} is not mirrored; user {} kept only upstream", realm, user.id);
            return Ok(());
        }
        let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) else {
            debug!("User {} of realm {} has no email; not mirrored", user.id, realm);
            return Ok(());
        };
        let now = Utc::now();
        users::Entity::insert(users::ActiveModel {
            id: Set(user.id.clone()),
            realm: Set(realm.to_string()),
            email: Set(email.to_lowercase()),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            is_org_manager: Set(user.is_org_manager),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(users::Column::Id)
                .update_columns([
                    users::Column::Email,
                    users::Column::FirstName,
                    users::Column::LastName,
                    users::Column::IsOrgManager,
                    users::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(self.db.as_ref())
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    pub async fn list_groups(&self, realm: &str) -> ServiceResult<Vec<GroupSummary>> {
        let representations: Vec<GroupRepresentation> =
            self.fetch_all(&format!("/admin/realms/{}/groups", segment(realm))).await?;
        let summaries: Vec<GroupSummary> = representations
            .into_iter()
            .filter_map(|g| {
                Some(GroupSummary {
                    id: g.id?,
                    name: g.name,
                })
            })
            .collect();

        if self.realm_is_mirrored(realm).await? {
            for group in &summaries {
                self.upsert_group_mirror(realm, group).await?;
            }
            let live: Vec<String> = summaries.iter().map(|g| g.id.clone()).collect();
            groups::Entity::delete_many()
                .filter(groups::Column::Realm.eq(realm))
                .filter(groups::Column::Id.is_not_in(live))
                .exec(self.db.as_ref())
                .await?;
        }

        Ok(summaries)
    }

    pub async fn create_group(&self, realm: &str, name: &str) -> ServiceResult<GroupSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Group name is required"));
        }
        let response = self
            .gateway
            .post(
                &format!("/admin/realms/{}/groups", segment(realm)),
                &json!({ "name": name }),
            )
            .await?;
        let id = response
            .created_id()
            .ok_or_else(|| ServiceError::upstream(500, "Group created without Location"))?;
        let group = GroupSummary {
            id,
            name: name.to_string(),
        };
        self.upsert_group_mirror(realm, &group).await?;
        info!("Created group {} in realm {}", group.name, realm);
        Ok(group)
    }

    pub async fn get_group(&self, realm: &str, group_id: &str) -> ServiceResult<GroupSummary> {
        let group: GroupRepresentation = self
            .gateway
            .get(&format!("/admin/realms/{}/groups/{}", segment(realm), segment(group_id)))
            .await?;
        Ok(GroupSummary {
            id: group.id.unwrap_or_else(|| group_id.to_string()),
            name: group.name,
        })
    }

    pub async fn rename_group(&self, realm: &str, group_id: &str, name: &str) -> ServiceResult<GroupSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Group name is required"));
        }
        self.gateway
            .put(
                &format!("/admin/realms/{}/groups/{}", segment(realm), segment(group_id)),
                &json!({ "id": group_id, "name": name }),
            )
            .await?;
        let group = GroupSummary {
            id: group_id.to_string(),
            name: name.to_string(),
        };
        self.upsert_group_mirror(realm, &group).await?;
        Ok(group)
    }

    pub async fn delete_group(&self, realm: &str, group_id: &str) -> ServiceResult<()> {
        self.gateway
            .delete(
                &format!("/admin/realms/{}/groups/{}", segment(realm), segment(group_id)),
                None,
            )
            .await?;
        groups::Entity::delete_by_id(group_id.to_string())
            .exec(self.db.as_ref())
            .await?;
        info!("Deleted group {} from realm {}", group_id, realm);
        Ok(())
    }

    pub async fn list_group_members(&self, realm: &str, group_id: &str) -> ServiceResult<Vec<UserSummary>> {
        let members: Vec<UserRepresentation> = self
            .fetch_all(&format!(
                "/admin/realms/{}/groups/{}/members",
                segment(realm),
                segment(group_id)
            ))
            .await?;
        let managers = self.org_manager_ids(realm).await?;
        Ok(members
            .into_iter()
            .filter_map(|user| {
                let id = user.id?;
                Some(UserSummary {
                    is_org_manager: managers.contains(&id),
                    id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                })
            })
            .collect())
    }

    pub async fn add_group_member(&self, realm: &str, group_id: &str, user_id: &str) -> ServiceResult<()> {
        self.gateway
            .put(
                &format!(
                    "/admin/realms/{}/users/{}/groups/{}",
                    segment(realm),
                    segment(user_id),
                    segment(group_id)
                ),
                &json!({}),
            )
            .await?;
        debug!("Added {} to group {} of realm {}", user_id, group_id, realm);
        Ok(())
    }

    pub async fn remove_group_member(&self, realm: &str, group_id: &str, user_id: &str) -> ServiceResult<()> {
        self.gateway
            .delete(
                &format!(
                    "/admin/realms/{}/users/{}/groups/{}",
                    segment(realm),
                    segment(user_id),
                    segment(group_id)
                ),
                None,
            )
            .await?;
        debug!("Removed {} from group {} of realm {}", user_id, group_id, realm);
        Ok(())
    }

    async fn upsert_group_mirror(&self, realm: &str, group: &GroupSummary) -> ServiceResult<()> {
        if !self.realm_is_mirrored(realm).await? {
            return Ok(());
        }
        let now = Utc::now();
        groups::Entity::insert(groups::ActiveModel {
            id: Set(group.id.clone()),
            realm: Set(realm.to_string()),
            name: Set(group.name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(groups::Column::Id)
                .update_columns([groups::Column::Name, groups::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Walk a paged identity provider collection to the end.
    async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut first = 0;
        loop {
            let page: Vec<T> = self
                .gateway
                .get(&format!("{}{}first={}&max={}", path, separator, first, PAGE_SIZE))
                .await?;
            let len = page.len();
            items.extend(page);
            if len < PAGE_SIZE {
                return Ok(items);
            }
            first += len;
        }
    }
}

#[async_trait]
impl GroupDirectory for TenantService {
    async fn group_members(&self, realm: &str, group_id: &str) -> ServiceResult<Vec<Recipient>> {
        let members: Vec<UserRepresentation> = self
            .fetch_all(&format!(
                "/admin/realms/{}/groups/{}/members",
                segment(realm),
                segment(group_id)
            ))
            .await?;

        Ok(members
            .into_iter()
            .filter(|user| user.enabled)
            .filter_map(|user| match (user.id, user.email) {
                (Some(user_id), Some(email)) if !email.is_empty() => Some(Recipient {
                    user_id,
                    email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                }),
                (id, _) => {
                    warn!("Skipping group member {:?} without email", id);
                    None
                }
            })
            .collect())
    }
}

fn summarize(representation: RealmRepresentation, features: BTreeMap<String, bool>) -> RealmSummary {
    RealmSummary {
        domain: representation.attributes.get(TENANT_DOMAIN_ATTRIBUTE).cloned(),
        name: representation.realm,
        enabled: representation.enabled,
        features,
        attributes: representation.attributes,
    }
}

fn has_role(roles: &[RoleRepresentation], role: RealmRole) -> bool {
    roles.iter().any(|r| r.name == role.as_str())
}

fn validate_realm_name(name: &str) -> ServiceResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "Realm name must be 1-64 lowercase letters, digits, '-' or '_'",
        ))
    }
}

fn validate_domain(domain: &str) -> ServiceResult<()> {
    let valid = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ServiceError::validation(format!("Invalid domain '{}'", domain)))
    }
}

fn validate_email(email: &str) -> ServiceResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ServiceError::validation(format!("Invalid email '{}'", email))),
    }
}

fn validate_feature_name(feature: &str) -> ServiceResult<()> {
    if !feature.is_empty()
        && feature
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ServiceError::validation(format!("Invalid feature name '{}'", feature)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_realm_name() {
        assert!(validate_realm_name("acme").is_ok());
        assert!(validate_realm_name("acme-corp_2").is_ok());
        assert!(validate_realm_name("").is_err());
        assert!(validate_realm_name("Acme").is_err());
        assert!(validate_realm_name("a/b").is_err());
    }

    #[test]
    fn test_validate_domain_and_email() {
        assert!(validate_domain("acme.test").is_ok());
        assert!(validate_domain("acme").is_err());
        assert!(validate_domain(".acme.test").is_err());
        assert!(validate_email("bob@acme.test").is_ok());
        assert!(validate_email("@acme.test").is_err());
        assert!(validate_email("bob").is_err());
    }

    #[test]
    fn test_summarize_reads_tenant_domain() {
        let representation = RealmRepresentation {
            realm: "acme".into(),
            enabled: true,
            attributes: [(TENANT_DOMAIN_ATTRIBUTE.to_string(), "acme.test".to_string())]
                .into_iter()
                .collect(),
        };
        let summary = summarize(representation, BTreeMap::new());
        assert_eq!(summary.domain.as_deref(), Some("acme.test"));
        assert_eq!(summary.name, "acme");
    }
}
