use crate::models::{
    AccessPoint, Alert, AlertScope, Location, LockState, Membership, Organization,
    PrincipalRecord, ResourceRef, Role, Routine, Severity,
};
use crate::services::store::{
    AlertCursor, AlertPage, AlertQuery, AlertStore, RoutineStore, TenancyStore,
};
use access_core::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    Client as MongoClient, Collection, Database, IndexModel,
    bson::{self, doc},
    options::{FindOptions, IndexOptions},
};

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

fn resource_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Resource not found"))
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for access-service");

        let location_owner = IndexModel::builder()
            .keys(doc! { "organization_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("location_owner_lookup".to_string())
                    .build(),
            )
            .build();
        self.locations().create_index(location_owner, None).await?;

        let access_point_owner = IndexModel::builder()
            .keys(doc! { "location_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("access_point_owner_lookup".to_string())
                    .build(),
            )
            .build();
        self.access_points()
            .create_index(access_point_owner, None)
            .await?;

        // Composite membership key; one record per (organization, principal).
        let membership_key = IndexModel::builder()
            .keys(doc! { "organization_id": 1, "principal_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("membership_key".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.memberships().create_index(membership_key, None).await?;

        let routine_owner = IndexModel::builder()
            .keys(doc! { "location_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("routine_owner_lookup".to_string())
                    .build(),
            )
            .build();
        self.routines().create_index(routine_owner, None).await?;

        let alert_feed = IndexModel::builder()
            .keys(doc! { "scope.type": 1, "created_at": -1, "_id": -1 })
            .options(
                IndexOptions::builder()
                    .name("alert_feed_scan".to_string())
                    .build(),
            )
            .build();
        self.alerts().create_index(alert_feed, None).await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn principals(&self) -> Collection<PrincipalRecord> {
        self.db.collection("principals")
    }

    pub fn organizations(&self) -> Collection<Organization> {
        self.db.collection("organizations")
    }

    pub fn locations(&self) -> Collection<Location> {
        self.db.collection("locations")
    }

    pub fn access_points(&self) -> Collection<AccessPoint> {
        self.db.collection("access_points")
    }

    pub fn memberships(&self) -> Collection<Membership> {
        self.db.collection("memberships")
    }

    pub fn routines(&self) -> Collection<Routine> {
        self.db.collection("routines")
    }

    pub fn alerts(&self) -> Collection<Alert> {
        self.db.collection("alerts")
    }
}

#[async_trait]
impl TenancyStore for MongoDb {
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<(), AppError> {
        self.principals().insert_one(record, None).await?;
        Ok(())
    }

    async fn find_principal(&self, id: &str) -> Result<Option<PrincipalRecord>, AppError> {
        Ok(self.principals().find_one(doc! { "_id": id }, None).await?)
    }

    async fn set_principal_disabled(&self, id: &str, disabled: bool) -> Result<(), AppError> {
        let result = self
            .principals()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "disabled": disabled } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<(), AppError> {
        self.organizations().insert_one(organization, None).await?;
        Ok(())
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, AppError> {
        Ok(self
            .organizations()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn delete_organization(&self, id: &str) -> Result<(), AppError> {
        if self
            .organizations()
            .find_one(doc! { "_id": id }, None)
            .await?
            .is_none()
        {
            return Err(resource_not_found());
        }

        let owned = self
            .locations()
            .count_documents(doc! { "organization_id": id }, None)
            .await?;
        if owned > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Organization still owns locations; delete them first"
            )));
        }

        self.organizations()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        self.memberships()
            .delete_many(doc! { "organization_id": id }, None)
            .await?;
        Ok(())
    }

    async fn insert_location(&self, location: &Location) -> Result<(), AppError> {
        if self
            .organizations()
            .find_one(doc! { "_id": &location.organization_id }, None)
            .await?
            .is_none()
        {
            return Err(resource_not_found());
        }
        self.locations().insert_one(location, None).await?;
        Ok(())
    }

    async fn find_location(&self, id: &str) -> Result<Option<Location>, AppError> {
        Ok(self.locations().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_locations(&self, organization_id: &str) -> Result<Vec<Location>, AppError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .locations()
            .find(doc! { "organization_id": organization_id }, options)
            .await?;
        let mut locations = Vec::new();
        while let Some(location) = cursor.try_next().await? {
            locations.push(location);
        }
        Ok(locations)
    }

    async fn delete_location(&self, id: &str) -> Result<(), AppError> {
        if self
            .locations()
            .find_one(doc! { "_id": id }, None)
            .await?
            .is_none()
        {
            return Err(resource_not_found());
        }

        let points = self
            .access_points()
            .count_documents(doc! { "location_id": id }, None)
            .await?;
        if points > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Location still owns access points; delete them first"
            )));
        }
        let routines = self
            .routines()
            .count_documents(doc! { "location_id": id }, None)
            .await?;
        if routines > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Location still owns routines; delete them first"
            )));
        }

        self.locations().delete_one(doc! { "_id": id }, None).await?;
        Ok(())
    }

    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError> {
        if self
            .locations()
            .find_one(doc! { "_id": &access_point.location_id }, None)
            .await?
            .is_none()
        {
            return Err(resource_not_found());
        }
        self.access_points().insert_one(access_point, None).await?;
        Ok(())
    }

    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError> {
        Ok(self
            .access_points()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn list_access_points(&self, location_id: &str) -> Result<Vec<AccessPoint>, AppError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .access_points()
            .find(doc! { "location_id": location_id }, options)
            .await?;
        let mut points = Vec::new();
        while let Some(point) = cursor.try_next().await? {
            points.push(point);
        }
        Ok(points)
    }

    async fn update_access_point_state(
        &self,
        id: &str,
        state: LockState,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let state_bson = bson::to_bson(&state).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize lock state: {}", e))
        })?;
        let mut set = doc! { "state": state_bson };
        if let Some(seen) = last_seen {
            set.insert("last_seen", bson::DateTime::from_chrono(seen));
        }

        let result = self
            .access_points()
            .update_one(doc! { "_id": id }, doc! { "$set": set }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }

    async fn delete_access_point(&self, id: &str) -> Result<(), AppError> {
        let result = self
            .access_points()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }

    async fn upsert_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
        role: Role,
        expected_version: Option<i64>,
    ) -> Result<Membership, AppError> {
        let role_bson = bson::to_bson(&role).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize role: {}", e))
        })?;
        let now = bson::DateTime::from_chrono(Utc::now());
        let key = doc! {
            "organization_id": organization_id,
            "principal_id": principal_id,
        };

        if let Some(expected) = expected_version {
            let mut guarded = key.clone();
            guarded.insert("version", expected);
            let result = self
                .memberships()
                .update_one(
                    guarded,
                    doc! {
                        "$set": { "role": role_bson, "updated_at": now },
                        "$inc": { "version": 1 },
                    },
                    None,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Membership version mismatch: expected {}",
                    expected
                )));
            }
        } else {
            // Last-write-wins per (organization, principal) pair.
            let result = self
                .memberships()
                .update_one(
                    key.clone(),
                    doc! {
                        "$set": { "role": role_bson, "updated_at": now },
                        "$inc": { "version": 1 },
                    },
                    None,
                )
                .await?;
            if result.matched_count == 0 {
                let membership = Membership::new(
                    organization_id.to_string(),
                    principal_id.to_string(),
                    role,
                );
                self.memberships().insert_one(&membership, None).await?;
                return Ok(membership);
            }
        }

        self.memberships()
            .find_one(key, None)
            .await?
            .ok_or_else(resource_not_found)
    }

    async fn find_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        Ok(self
            .memberships()
            .find_one(
                doc! {
                    "organization_id": organization_id,
                    "principal_id": principal_id,
                },
                None,
            )
            .await?)
    }

    async fn memberships_for_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Membership>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "organization_id": 1 })
            .build();
        let mut cursor = self
            .memberships()
            .find(doc! { "principal_id": principal_id }, options)
            .await?;
        let mut memberships = Vec::new();
        while let Some(membership) = cursor.try_next().await? {
            memberships.push(membership);
        }
        Ok(memberships)
    }

    async fn remove_membership(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<(), AppError> {
        let result = self
            .memberships()
            .delete_one(
                doc! {
                    "organization_id": organization_id,
                    "principal_id": principal_id,
                },
                None,
            )
            .await?;
        if result.deleted_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }

    async fn resolve_owning_organization(
        &self,
        resource: &ResourceRef,
    ) -> Result<String, AppError> {
        match resource {
            ResourceRef::Organization { id } => self
                .find_organization(id)
                .await?
                .map(|o| o.id)
                .ok_or_else(resource_not_found),
            ResourceRef::Location { id } => self
                .find_location(id)
                .await?
                .map(|l| l.organization_id)
                .ok_or_else(resource_not_found),
            ResourceRef::AccessPoint { id } => {
                let ap = self
                    .find_access_point(id)
                    .await?
                    .ok_or_else(resource_not_found)?;
                self.find_location(&ap.location_id)
                    .await?
                    .map(|l| l.organization_id)
                    .ok_or_else(resource_not_found)
            }
        }
    }
}

#[async_trait]
impl RoutineStore for MongoDb {
    async fn insert_routine(&self, routine: &Routine) -> Result<(), AppError> {
        self.routines().insert_one(routine, None).await?;
        Ok(())
    }

    async fn find_routine(&self, id: &str) -> Result<Option<Routine>, AppError> {
        Ok(self.routines().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_routines(&self, location_id: &str) -> Result<Vec<Routine>, AppError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .routines()
            .find(doc! { "location_id": location_id }, options)
            .await?;
        let mut routines = Vec::new();
        while let Some(routine) = cursor.try_next().await? {
            routines.push(routine);
        }
        Ok(routines)
    }

    async fn list_enabled_routines(&self) -> Result<Vec<Routine>, AppError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .routines()
            .find(doc! { "enabled": true }, options)
            .await?;
        let mut routines = Vec::new();
        while let Some(routine) = cursor.try_next().await? {
            routines.push(routine);
        }
        Ok(routines)
    }

    async fn set_routine_enabled(&self, id: &str, enabled: bool) -> Result<(), AppError> {
        let result = self
            .routines()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "enabled": enabled } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }

    async fn delete_routine(&self, id: &str) -> Result<(), AppError> {
        let result = self.routines().delete_one(doc! { "_id": id }, None).await?;
        if result.deleted_count == 0 {
            return Err(resource_not_found());
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MongoDb {
    async fn append_alert(&self, alert: &Alert) -> Result<(), AppError> {
        self.alerts().insert_one(alert, None).await?;
        Ok(())
    }

    async fn query_alerts(&self, query: &AlertQuery) -> Result<AlertPage, AppError> {
        let mut filter = match &query.scope {
            AlertScope::Platform => doc! { "scope.type": "platform" },
            AlertScope::Organization { organization_id } => doc! {
                "scope.type": "organization",
                "scope.organization_id": organization_id,
            },
        };

        let severities: Vec<&str> = Severity::ALL
            .iter()
            .filter(|s| **s >= query.severity_floor)
            .map(|s| s.as_str())
            .collect();
        filter.insert("severity", doc! { "$in": severities });

        if let Some(since) = query.since {
            filter.insert(
                "created_at",
                doc! { "$gte": bson::DateTime::from_chrono(since) },
            );
        }

        if let Some(cursor) = &query.cursor {
            let position = bson::DateTime::from_chrono(cursor.created_at);
            filter.insert(
                "$or",
                vec![
                    doc! { "created_at": { "$lt": position } },
                    doc! { "created_at": position, "_id": { "$lt": &cursor.id } },
                ],
            );
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit((query.limit + 1) as i64)
            .build();

        let mut cursor = self.alerts().find(filter, options).await?;
        let mut alerts = Vec::new();
        while let Some(alert) = cursor.try_next().await? {
            alerts.push(alert);
        }

        let has_more = alerts.len() > query.limit;
        alerts.truncate(query.limit);

        let next_cursor = if has_more {
            alerts.last().map(|last| {
                AlertCursor {
                    created_at: last.created_at,
                    id: last.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(AlertPage {
            alerts,
            next_cursor,
        })
    }
}
