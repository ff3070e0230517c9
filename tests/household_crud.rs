use anyhow::Result;
use moradia::{
    create_household, create_rule, create_user, find_households_for_user, get_household,
    list_households_by_owner, migrate, model, update_household, AmenityInput, ExpenseInput,
    HouseholdCreateInput, HouseholdUpdateInput, RuleCreateInput, TaskInput, User, UserCreateInput,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

async fn seed_user(pool: &SqlitePool, name: &str) -> Result<User> {
    Ok(create_user(
        pool,
        UserCreateInput {
            display_name: name.to_string(),
            email: None,
        },
    )
    .await?)
}

fn base_input(owner_id: &str) -> HouseholdCreateInput {
    HouseholdCreateInput {
        name: "Casa Verde".into(),
        address: "Rua X, 10".into(),
        owner_id: owner_id.to_string(),
        rent: 500.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn create_minimal_household_has_no_residents() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;

    let household = create_household(&pool, base_input(&owner.id)).await?;
    assert_eq!(household.name, "Casa Verde");
    assert_eq!(household.address, "Rua X, 10");
    assert_eq!(household.rent, 500.0);
    assert_eq!(household.owner.id, owner.id);
    assert!(household.residents.is_empty());
    assert!(household.amenities.is_empty());
    assert!(household.rule_links.is_empty());
    Ok(())
}

#[tokio::test]
async fn create_rejects_bad_inputs_before_any_write() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;

    let mut input = base_input(&owner.id);
    input.name = "  ".into();
    let err = create_household(&pool, input)
        .await
        .expect_err("blank name must fail");
    assert_eq!(err.code(), model::HOUSEHOLD_INVALID_NAME);

    let mut input = base_input(&owner.id);
    input.rent = 0.0;
    let err = create_household(&pool, input)
        .await
        .expect_err("non-positive rent must fail");
    assert_eq!(err.code(), model::HOUSEHOLD_INVALID_RENT);

    let err = create_household(&pool, base_input("nobody"))
        .await
        .expect_err("unknown owner must fail");
    assert_eq!(err.code(), model::USER_NOT_FOUND);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0, "no household row may survive a rejected create");
    Ok(())
}

#[tokio::test]
async fn create_with_nested_specs_and_rules() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;
    let resident = seed_user(&pool, "Bruno").await?;
    let rule = create_rule(
        &pool,
        RuleCreateInput {
            title: "No smoking".into(),
            description: None,
        },
    )
    .await?;

    let mut input = base_input(&owner.id);
    input.resident_ids = vec![resident.id.clone()];
    input.tasks = vec![TaskInput {
        title: "Clean kitchen".into(),
        description: None,
        due_at: Some(1_700_000_000_000),
    }];
    input.expenses = vec![ExpenseInput {
        description: "Internet".into(),
        amount: 40.0,
        paid_by: Some(owner.id.clone()),
        due_at: None,
    }];
    input.amenities = vec![
        AmenityInput {
            name: "Washing machine".into(),
            description: None,
        },
        // Nameless specs are skipped, not rejected.
        AmenityInput {
            name: "   ".into(),
            description: Some("ghost".into()),
        },
    ];
    input.rule_ids = vec![rule.id.clone()];

    let household = create_household(&pool, input).await?;
    assert_eq!(household.residents.len(), 1);
    assert_eq!(household.residents[0].id, resident.id);
    assert_eq!(household.amenities.len(), 1);
    assert_eq!(household.amenities[0].name, "Washing machine");
    assert_eq!(household.rule_links.len(), 1);
    assert_eq!(household.rule_links[0].rule_id, rule.id);

    let tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE household_id = ?1")
        .bind(&household.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(tasks, 1);
    let expenses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenses WHERE household_id = ?1")
        .bind(&household.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(expenses, 1);

    let stored_resident = moradia::get_user(&pool, &resident.id).await?;
    assert_eq!(
        stored_resident.residency_household_id.as_deref(),
        Some(household.id.as_str())
    );
    Ok(())
}

#[tokio::test]
async fn create_rejects_owner_listed_as_resident() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;

    let mut input = base_input(&owner.id);
    input.resident_ids = vec![owner.id.clone()];
    let err = create_household(&pool, input)
        .await
        .expect_err("owner cannot be an initial resident");
    assert_eq!(err.code(), model::MEMBERSHIP_OWNER_EXCLUSIVE);
    Ok(())
}

#[tokio::test]
async fn create_reports_already_assigned_residents() -> Result<()> {
    let pool = memory_pool().await?;
    let owner_a = seed_user(&pool, "Ana").await?;
    let owner_b = seed_user(&pool, "Berta").await?;
    let resident = seed_user(&pool, "Bruno").await?;

    let mut first = base_input(&owner_a.id);
    first.resident_ids = vec![resident.id.clone()];
    create_household(&pool, first).await?;

    let mut second = base_input(&owner_b.id);
    second.name = "Casa Azul".into();
    second.resident_ids = vec![resident.id.clone()];
    let err = create_household(&pool, second)
        .await
        .expect_err("resident already lives elsewhere");
    assert_eq!(err.code(), model::MEMBERSHIP_ALREADY_RESIDENT);
    assert_eq!(
        err.context().get("user_ids"),
        Some(&resident.id),
        "offending identities are reported"
    );
    Ok(())
}

#[tokio::test]
async fn failed_nested_insert_rolls_back_the_household() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;

    let mut input = base_input(&owner.id);
    input.expenses = vec![ExpenseInput {
        description: "bogus".into(),
        amount: -5.0,
        paid_by: None,
        due_at: None,
    }];
    create_household(&pool, input)
        .await
        .expect_err("negative expense amount must abort creation");

    let households: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household")
        .fetch_one(&pool)
        .await?;
    assert_eq!(households, 0);
    let expenses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenses")
        .fetch_one(&pool)
        .await?;
    assert_eq!(expenses, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_rule_in_create_input_rolls_back_everything() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;
    let rule = create_rule(
        &pool,
        RuleCreateInput {
            title: "Quiet hours".into(),
            description: None,
        },
    )
    .await?;

    let mut input = base_input(&owner.id);
    input.rule_ids = vec![rule.id.clone(), rule.id.clone()];
    let err = create_household(&pool, input)
        .await
        .expect_err("duplicate rule link aborts creation");
    assert_eq!(err.code(), model::RULES_DUPLICATE_LINK);

    let households: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household")
        .fetch_one(&pool)
        .await?;
    assert_eq!(households, 0, "rule linking is part of the same transaction");
    Ok(())
}

#[tokio::test]
async fn get_household_not_found() -> Result<()> {
    let pool = memory_pool().await?;
    let err = get_household(&pool, "missing")
        .await
        .expect_err("unknown household");
    assert_eq!(err.code(), model::HOUSEHOLD_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn update_changes_only_provided_fields() -> Result<()> {
    let pool = memory_pool().await?;
    let owner = seed_user(&pool, "Ana").await?;
    let household = create_household(&pool, base_input(&owner.id)).await?;

    let updated = update_household(
        &pool,
        &household.id,
        HouseholdUpdateInput {
            rent: Some(620.5),
            image_ref: Some("casa-verde.jpg".into()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(updated.rent, 620.5);
    assert_eq!(updated.image_ref.as_deref(), Some("casa-verde.jpg"));
    assert_eq!(updated.name, "Casa Verde");
    assert_eq!(updated.address, "Rua X, 10");

    let err = update_household(
        &pool,
        &household.id,
        HouseholdUpdateInput {
            rent: Some(-1.0),
            ..Default::default()
        },
    )
    .await
    .expect_err("non-positive rent rejected on update too");
    assert_eq!(err.code(), model::HOUSEHOLD_INVALID_RENT);

    let err = update_household(&pool, "missing", HouseholdUpdateInput::default())
        .await
        .expect_err("unknown household");
    assert_eq!(err.code(), model::HOUSEHOLD_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn listing_resolves_ownership_and_residency() -> Result<()> {
    let pool = memory_pool().await?;
    let ana = seed_user(&pool, "Ana").await?;
    let bruno = seed_user(&pool, "Bruno").await?;

    let casa_verde = create_household(&pool, base_input(&ana.id)).await?;
    let mut second = base_input(&bruno.id);
    second.name = "Casa Azul".into();
    second.resident_ids = vec![ana.id.clone()];
    let casa_azul = create_household(&pool, second).await?;

    let owned = list_households_by_owner(&pool, &ana.id).await?;
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, casa_verde.id);

    // Ana owns Casa Verde and resides in Casa Azul.
    let touched = find_households_for_user(&pool, &ana.id).await?;
    let mut ids: Vec<_> = touched.iter().map(|h| h.id.as_str()).collect();
    ids.sort_unstable();
    let mut expected = vec![casa_verde.id.as_str(), casa_azul.id.as_str()];
    expected.sort_unstable();
    assert_eq!(ids, expected);

    let nobody = find_households_for_user(&pool, "nobody").await?;
    assert!(nobody.is_empty());
    Ok(())
}
