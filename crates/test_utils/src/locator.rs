//! Test utilities associated with request locators.

/// Create a random locator, so tests sharing a store do not collide.
pub fn random_locator() -> String {
    format!("/test/{:016x}", rand::random::<u64>())
}
