/// Admin service for configuration and room cleanup.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Degrading wrappers over the issue tracker boundary.
pub mod issue_service;
/// Core session operations and the concurrency-safe mutation protocol.
pub mod room_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
