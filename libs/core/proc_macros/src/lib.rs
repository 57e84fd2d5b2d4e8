// Re-export proc macros when their features are enabled
#[cfg(feature = "sea_orm_resource")]
pub use sea_orm_resource::SeaOrmResource;

/// Trait for REST API resource metadata.
///
/// This trait provides constants for resource URLs, database collection names,
/// and API documentation tags. It is typically derived using the `ApiResource` macro.
///
/// # Examples
///
/// ```ignore
/// use core_proc_macros::ApiResource;
///
/// #[derive(ApiResource)]
/// pub struct User {
///     id: Uuid,
///     email: String,
/// }
///
/// assert_eq!(User::URL, "/user");
/// assert_eq!(User::COLLECTION, "users");
/// ```
pub trait ApiResource {
    /// The base URL path for this resource (e.g., "/user")
    const URL: &'static str;
    /// The database collection or table name (e.g., "users")
    const COLLECTION: &'static str;
    /// The API documentation tag (e.g., "Users")
    const TAG: &'static str;
}
