// src/store/paths.rs
//
// Layout of a project namespace:
//
//   projects/{project}                      <- contention domain for purchase commits
//   projects/{project}/products/{productId}
//   projects/{project}/purchases/{key}
//   projects/{project}/subscriptions/{key}
//   projects/{project}/users/{userId}

pub const PROJECTS: &str = "projects";

pub fn project(project: &str) -> String {
    format!("{PROJECTS}/{project}")
}

pub fn products(project: &str) -> String {
    format!("{PROJECTS}/{project}/products")
}

pub fn product(project: &str, product_id: &str) -> String {
    format!("{PROJECTS}/{project}/products/{product_id}")
}

pub fn purchases(project: &str) -> String {
    format!("{PROJECTS}/{project}/purchases")
}

pub fn subscriptions(project: &str) -> String {
    format!("{PROJECTS}/{project}/subscriptions")
}

pub fn subscription(project: &str, key: &str) -> String {
    format!("{PROJECTS}/{project}/subscriptions/{key}")
}

pub fn user(project: &str, user_id: &str) -> String {
    format!("{PROJECTS}/{project}/users/{user_id}")
}
