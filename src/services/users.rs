use crate::{
    auth::{hash_password, verify_password, AuthService, AuthUser, TokenResponse},
    entities::{
        cart, cart_item, order, user, Cart, CartItem, Order, OrderModel, User, UserModel, UserRole,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Account created from the back office.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_role() -> UserRole {
    UserRole::User
}

fn default_active() -> bool {
    true
}

/// Partial profile update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    /// Blank keeps the current password
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

impl UpdateUserInput {
    /// The replacement password, if one was actually supplied.
    fn new_password(&self) -> Result<Option<&str>, ServiceError> {
        match self.password.as_deref().filter(|p| !p.trim().is_empty()) {
            None => Ok(None),
            Some(p) if (8..=128).contains(&p.chars().count()) => Ok(Some(p)),
            Some(_) => Err(ServiceError::ValidationError(
                "password must be between 8 and 128 characters".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlySignups {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleCount {
    pub role: UserRole,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopCustomer {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub total_orders: u64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserStatistics {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub total_admins: u64,
    pub total_orders: u64,
    /// Sign-ups for each of the last twelve months, oldest first
    pub user_growth: Vec<MonthlySignups>,
    pub role_counts: Vec<RoleCount>,
    pub top_customers: Vec<TopCustomer>,
}

const GROWTH_MONTHS: u32 = 12;
const TOP_CUSTOMERS: usize = 10;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthSession {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: UserModel,
}

/// Back-office action applied to a set of users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BulkAction {
    ChangeRole { role: UserRole },
    ChangeStatus { active: bool },
    Delete,
    Export,
}

impl BulkAction {
    fn name(&self) -> &'static str {
        match self {
            BulkAction::ChangeRole { .. } => "change_role",
            BulkAction::ChangeStatus { .. } => "change_status",
            BulkAction::Delete => "delete",
            BulkAction::Export => "export",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BulkActionRequest {
    #[validate(length(min = 1, max = 500))]
    pub user_ids: Vec<Uuid>,
    pub action: BulkAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkFailure {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkActionReport {
    pub action: String,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
    /// Filled only for `export`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<Vec<UserModel>>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accounts, credentials and back-office user management.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            auth,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, ServiceError> {
        input.validate()?;
        let user = self
            .insert_account(&input.name, &input.email, &input.password, UserRole::User, true)
            .await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!(user_id = %user.id, "Registered user");

        self.session_for(user)
    }

    /// Back-office account creation with an explicit role and status.
    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<UserModel, ServiceError> {
        input.validate()?;
        let user = self
            .insert_account(
                &input.name,
                &input.email,
                &input.password,
                input.role,
                input.active,
            )
            .await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn insert_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
        active: bool,
    ) -> Result<UserModel, ServiceError> {
        let email = normalize_email(email);

        let txn = self.db.begin().await?;
        let taken = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(password)?),
            role: Set(role),
            active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, ServiceError> {
        input.validate()?;

        let user = User::find()
            .filter(user::Column::Email.eq(normalize_email(&input.email)))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No account with that email".to_string()))?;

        if !user.active {
            return Err(ServiceError::Forbidden("Account is deactivated".to_string()));
        }

        if !verify_password(&user.password_hash, &input.password)? {
            warn!(user_id = %user.id, "failed login");
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        self.session_for(user)
    }

    fn session_for(&self, user: UserModel) -> Result<AuthSession, ServiceError> {
        let token = self
            .auth
            .generate_token(&user)
            .map_err(|e| ServiceError::JwtError(e.to_string()))?;
        Ok(AuthSession { token, user })
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    /// True when no account uses `email`.
    #[instrument(skip(self))]
    pub async fn email_available(&self, email: &str) -> Result<bool, ServiceError> {
        let count = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .count(&*self.db)
            .await?;
        Ok(count == 0)
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
        search: Option<&str>,
    ) -> Result<(Vec<UserModel>, u64), ServiceError> {
        let mut query = User::find().order_by_desc(user::Column::CreatedAt);
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(user::Column::Name.contains(term))
                    .add(user::Column::Email.contains(term)),
            );
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    /// Applies a partial profile update. The email must stay unique, and a
    /// blank password leaves the stored hash untouched.
    #[instrument(skip(self, actor, input), fields(actor = %actor.user_id))]
    pub async fn update_user(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateUserInput,
    ) -> Result<UserModel, ServiceError> {
        input.validate()?;
        let new_password = input.new_password()?;

        let txn = self.db.begin().await?;
        let target = User::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;

        let role_change = input.role.filter(|role| *role != target.role);
        let deactivating = input.active == Some(false) && target.active;
        if target.id == actor.user_id && (role_change.is_some() || deactivating) {
            return Err(ServiceError::InvalidOperation(
                "You cannot change your own role or status".to_string(),
            ));
        }
        if deactivating && target.is_admin() {
            return Err(ServiceError::Forbidden(
                "Admin accounts cannot be deactivated".to_string(),
            ));
        }

        let email = input.email.as_deref().map(normalize_email);
        if let Some(email) = email.as_ref().filter(|e| **e != target.email) {
            let taken = User::find()
                .filter(user::Column::Email.eq(email.clone()))
                .filter(user::Column::Id.ne(target.id))
                .one(&txn)
                .await?
                .is_some();
            if taken {
                return Err(ServiceError::Conflict(
                    "Email is already registered".to_string(),
                ));
            }
        }

        let mut model: user::ActiveModel = target.into();
        if let Some(name) = input.name.as_deref() {
            model.name = Set(name.trim().to_string());
        }
        if let Some(email) = email {
            model.email = Set(email);
        }
        if let Some(password) = new_password {
            model.password_hash = Set(hash_password(password)?);
        }
        if let Some(role) = input.role {
            model.role = Set(role);
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&txn).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::UserUpdated(updated.id)).await;
        if let Some(role) = role_change {
            self.event_sender
                .send_or_log(Event::UserRoleChanged {
                    user_id: updated.id,
                    role: role.to_string(),
                })
                .await;
        }
        info!(user_id = %updated.id, password_reset = new_password.is_some(), "Updated user");
        Ok(updated)
    }

    /// Sign-up growth, role and status breakdowns, and best customers.
    #[instrument(skip(self))]
    pub async fn user_statistics(&self) -> Result<UserStatistics, ServiceError> {
        let users = User::find().all(&*self.db).await?;
        let orders = Order::find().all(&*self.db).await?;
        Ok(summarize(&users, &orders, Utc::now()))
    }

    /// Flips the `active` flag of a non-admin account other than the caller's.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn toggle_active(&self, actor: &AuthUser, id: Uuid) -> Result<UserModel, ServiceError> {
        let target = self.get_user(id).await?;
        guard_target(actor, &target)?;
        self.set_active(target, None).await
    }

    /// Deletes a non-admin account other than the caller's, together with its
    /// cart and orders.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete_user(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let target = self.get_user(id).await?;
        guard_target(actor, &target)?;
        self.remove(target.id).await
    }

    /// Applies one action to each listed user and reports per-user outcomes.
    /// A failure for one user does not stop the others.
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, action = request.action.name(), count = request.user_ids.len()))]
    pub async fn bulk_action(
        &self,
        actor: &AuthUser,
        request: BulkActionRequest,
    ) -> Result<BulkActionReport, ServiceError> {
        request.validate()?;

        let mut report = BulkActionReport {
            action: request.action.name().to_string(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            exported: None,
        };
        let mut exported = Vec::new();

        for user_id in request.user_ids {
            let outcome = match self.get_user(user_id).await {
                Err(e) => Err(e),
                Ok(target) => match &request.action {
                    BulkAction::Export => {
                        exported.push(target);
                        Ok(())
                    }
                    BulkAction::ChangeRole { role } => {
                        if target.id == actor.user_id {
                            Err(ServiceError::InvalidOperation(
                                "You cannot change your own role".to_string(),
                            ))
                        } else {
                            self.set_role(target, *role).await.map(|_| ())
                        }
                    }
                    BulkAction::ChangeStatus { active } => match guard_target(actor, &target) {
                        Ok(()) => self.set_active(target, Some(*active)).await.map(|_| ()),
                        Err(e) => Err(e),
                    },
                    BulkAction::Delete => match guard_target(actor, &target) {
                        Ok(()) => self.remove(target.id).await,
                        Err(e) => Err(e),
                    },
                },
            };

            match outcome {
                Ok(()) => report.succeeded.push(user_id),
                Err(e) => report.failed.push(BulkFailure {
                    user_id,
                    reason: e.response_message(),
                }),
            }
        }

        if request.action == BulkAction::Export {
            report.exported = Some(exported);
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk action finished"
        );
        Ok(report)
    }

    async fn set_active(
        &self,
        target: UserModel,
        active: Option<bool>,
    ) -> Result<UserModel, ServiceError> {
        let next = active.unwrap_or(!target.active);
        let mut model: user::ActiveModel = target.into();
        model.active = Set(next);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserStatusChanged {
                user_id: updated.id,
                active: updated.active,
            })
            .await;
        Ok(updated)
    }

    async fn set_role(&self, target: UserModel, role: UserRole) -> Result<UserModel, ServiceError> {
        let mut model: user::ActiveModel = target.into();
        model.role = Set(role);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRoleChanged {
                user_id: updated.id,
                role: updated.role.to_string(),
            })
            .await;
        Ok(updated)
    }

    async fn remove(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
            Cart::delete_by_id(cart.id).exec(&txn).await?;
        }
        Order::delete_many()
            .filter(order::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        User::delete_by_id(user_id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::UserDeleted(user_id)).await;
        info!(%user_id, "Deleted user");
        Ok(())
    }
}

/// `YYYY-MM` keys for the `count` months ending with the one containing `now`.
fn trailing_months(now: DateTime<Utc>, count: u32) -> Vec<String> {
    let current = now.year() * 12 + now.month0() as i32;
    (0..count as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
        })
        .collect()
}

fn summarize(users: &[UserModel], orders: &[OrderModel], now: DateTime<Utc>) -> UserStatistics {
    let mut growth: BTreeMap<String, u64> = trailing_months(now, GROWTH_MONTHS)
        .into_iter()
        .map(|month| (month, 0))
        .collect();
    let mut roles: BTreeMap<String, RoleCount> = BTreeMap::new();
    let mut active_users = 0;

    for user in users {
        if let Some(count) = growth.get_mut(&user.created_at.format("%Y-%m").to_string()) {
            *count += 1;
        }
        roles
            .entry(user.role.to_string())
            .or_insert(RoleCount {
                role: user.role,
                count: 0,
            })
            .count += 1;
        if user.active {
            active_users += 1;
        }
    }

    let mut spend: HashMap<Uuid, (u64, Decimal)> = HashMap::new();
    for order in orders {
        let entry = spend.entry(order.user_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += order.total;
    }

    let mut top_customers: Vec<TopCustomer> = users
        .iter()
        .filter_map(|user| {
            spend.get(&user.id).map(|(total_orders, total_spent)| TopCustomer {
                user_id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
                total_orders: *total_orders,
                total_spent: *total_spent,
            })
        })
        .collect();
    top_customers.sort_by(|a, b| {
        b.total_orders
            .cmp(&a.total_orders)
            .then_with(|| b.total_spent.cmp(&a.total_spent))
            .then_with(|| a.email.cmp(&b.email))
    });
    top_customers.truncate(TOP_CUSTOMERS);

    let total_users = users.len() as u64;
    UserStatistics {
        total_users,
        active_users,
        inactive_users: total_users - active_users,
        total_admins: users.iter().filter(|u| u.is_admin()).count() as u64,
        total_orders: orders.len() as u64,
        user_growth: growth
            .into_iter()
            .map(|(month, count)| MonthlySignups { month, count })
            .collect(),
        role_counts: roles.into_values().collect(),
        top_customers,
    }
}

/// Admins may not act on themselves or on other admins.
fn guard_target(actor: &AuthUser, target: &UserModel) -> Result<(), ServiceError> {
    if target.id == actor.user_id {
        return Err(ServiceError::InvalidOperation(
            "You cannot modify your own account".to_string(),
        ));
    }
    if target.is_admin() {
        return Err(ServiceError::Forbidden(
            "Admin accounts cannot be modified".to_string(),
        ));
    }
    Ok(())
}
