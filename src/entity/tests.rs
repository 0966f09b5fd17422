use std::hash;

use super::Entity;

static_assertions::assert_impl_all!(Entity: Copy, Ord, hash::Hash);

#[test]
fn test_invalid_sentinel() {
    assert!(Entity::INVALID.is_invalid());
    assert!(!Entity::from_index(0).is_invalid());
    assert_eq!(format!("{:?}", Entity::INVALID), "Entity(invalid)");
    assert_eq!(format!("{}", Entity::from_index(7)), "Entity(7)");
}
