use serde::{Deserialize, Serialize};

pub const HOUSEHOLD_NOT_FOUND: &str = "HOUSEHOLD/NOT_FOUND";
pub const HOUSEHOLD_INVALID_NAME: &str = "HOUSEHOLD/INVALID_NAME";
pub const HOUSEHOLD_INVALID_ADDRESS: &str = "HOUSEHOLD/INVALID_ADDRESS";
pub const HOUSEHOLD_INVALID_RENT: &str = "HOUSEHOLD/INVALID_RENT";

pub const USER_NOT_FOUND: &str = "USER/NOT_FOUND";
pub const USER_INVALID_NAME: &str = "USER/INVALID_NAME";
pub const USER_EMAIL_TAKEN: &str = "USER/EMAIL_TAKEN";

pub const MEMBERSHIP_CAPACITY_EXCEEDED: &str = "MEMBERSHIP/CAPACITY_EXCEEDED";
pub const MEMBERSHIP_ALREADY_RESIDENT: &str = "MEMBERSHIP/ALREADY_RESIDENT";
pub const MEMBERSHIP_OWNER_EXCLUSIVE: &str = "MEMBERSHIP/OWNER_EXCLUSIVE";
pub const MEMBERSHIP_DUPLICATE_RESIDENT: &str = "MEMBERSHIP/DUPLICATE_RESIDENT";
pub const MEMBERSHIP_NOT_RESIDENT: &str = "MEMBERSHIP/NOT_RESIDENT";

pub const RULES_NOT_FOUND: &str = "RULES/NOT_FOUND";
pub const RULES_DUPLICATE_LINK: &str = "RULES/DUPLICATE_LINK";
pub const RULES_INVALID_TITLE: &str = "RULES/INVALID_TITLE";

pub const AMENITY_NOT_FOUND: &str = "AMENITY/NOT_FOUND";
pub const AMENITY_INVALID_NAME: &str = "AMENITY/INVALID_NAME";

pub const CASCADE_FK_DRIFT: &str = "CASCADE/FK_DRIFT";
pub const DB_ACQUIRE_TIMEOUT: &str = "DB/ACQUIRE_TIMEOUT";
pub const DB_TX_TIMEOUT: &str = "DB/TX_TIMEOUT";

/// Hard cap on residents per household. Ownership is a separate relation and
/// does not count against it.
pub const MAX_RESIDENTS: i64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "snake_case")]
pub struct User {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residency_household_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Flat household row, as stored. List operations return these.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "snake_case")]
pub struct HouseholdRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub address: String,
    pub rent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Household with its nested relations resolved, the shape the transport
/// hands out for single-household reads and mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Household {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub address: String,
    pub rent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub owner: User,
    pub residents: Vec<User>,
    pub amenities: Vec<Amenity>,
    pub rule_links: Vec<RuleLink>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "snake_case")]
pub struct Amenity {
    pub id: String,
    pub household_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "snake_case")]
pub struct Rule {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "snake_case")]
pub struct RuleLink {
    pub id: String,
    pub household_id: String,
    pub rule_id: String,
    pub created_at: i64,
}

/// Minimal snapshot of a removed household, returned so the caller can clean
/// up external artefacts (the image file lives outside the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeletedHousehold {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub rows_deleted: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HouseholdCreateInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub address: String,
    #[serde(alias = "ownerId")]
    pub owner_id: String,
    pub rent: f64,
    #[serde(default, alias = "imageRef")]
    pub image_ref: Option<String>,
    #[serde(default, alias = "residentIds")]
    pub resident_ids: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TaskInput>,
    #[serde(default)]
    pub expenses: Vec<ExpenseInput>,
    #[serde(default)]
    pub amenities: Vec<AmenityInput>,
    #[serde(default, alias = "ruleIds")]
    pub rule_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "dueAt")]
    pub due_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    pub description: String,
    pub amount: f64,
    #[serde(default, alias = "paidBy")]
    pub paid_by: Option<String>,
    #[serde(default, alias = "dueAt")]
    pub due_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmenityInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HouseholdUpdateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rent: Option<f64>,
    #[serde(default, alias = "imageRef")]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreateInput {
    #[serde(alias = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCreateInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}
