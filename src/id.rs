use uuid::Uuid;

/// Time-ordered UUIDs keep insertion order roughly monotonic, which keeps
/// the `ORDER BY created_at, id` listings stable.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_parseable() {
        let a = new_uuid_v7();
        let b = new_uuid_v7();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
