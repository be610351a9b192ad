//! Declarative markers for protected operations.

use crate::models::PermissionLevel;

/// The `(resource, action, level)` an operation requires through RBAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredPermission {
    pub resource: &'static str,
    pub action: &'static str,
    pub level: PermissionLevel,
}

/// Static descriptor of a guarded operation.
///
/// Declared once as a constant next to the handler it protects and passed to
/// [`super::PermissionEngine::enforce`] on every call:
///
/// ```ignore
/// const UPDATE_ORDER: ProtectedOperation = ProtectedOperation {
///     name: "update_order",
///     resource_type: "order",
///     permission: Some(RequiredPermission {
///         resource: "order",
///         action: "update",
///         level: PermissionLevel::Write,
///     }),
///     data_type: Some(data_types::DEPARTMENT),
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedOperation {
    /// Operation name, used in logs.
    pub name: &'static str,
    pub resource_type: &'static str,
    /// RBAC requirement; `None` means the operation is scope-only.
    pub permission: Option<RequiredPermission>,
    /// Data scope key resolved when access is granted.
    pub data_type: Option<&'static str>,
}
