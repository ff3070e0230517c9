//! Shared-housing household core: household lifecycle, owner/resident
//! membership rules, rule/amenity linkage and dependency-ordered deletion.
//! Transport, auth and file storage are the host application's business;
//! everything here is plain functions over a `SqlitePool`.

mod amenities;
mod cascade;
pub mod db;
mod error;
mod household;
mod id;
pub mod logging;
mod membership;
pub mod migrate;
pub mod model;
pub mod repo;
mod rule_links;
mod time;
mod users;

pub use amenities::{add_amenity, list_amenities, remove_amenity};
pub use cascade::{cascade_phase_tables, delete_household, CascadeDeleteOptions};
pub use error::{AppError, AppResult, ErrorCategory};
pub use household::{
    create_household, find_households_for_user, get_household, list_households_by_owner,
    update_household,
};
pub use membership::{add_resident, remove_resident};
pub use model::{
    Amenity, AmenityInput, DeletedHousehold, ExpenseInput, Household, HouseholdCreateInput,
    HouseholdRecord, HouseholdUpdateInput, Rule, RuleCreateInput, RuleLink, TaskInput, User,
    UserCreateInput, MAX_RESIDENTS,
};
pub use rule_links::{create_rule, link_rule, list_rules, unlink_rule};
pub use users::{create_user, get_user};
