//! Tenant (school) scope resolution.
//!
//! Every tenant-scoped read or write calls `resolve_school_scope` first and
//! uses the returned id as a mandatory equality constraint. The function is
//! pure: identity in, school id (or rejection) out.

use uuid::Uuid;

use crate::api::error::ApiError;

use super::principal::Principal;

/// Decide which school a request may act on.
///
/// - Platform callers (`SUPERADMIN`) may pick any school, or none for a
///   platform-wide view unless `require_for_platform` demands an explicit
///   choice.
/// - School-bound callers always act on their own school; naming any other
///   school is a hard denial, and an identity without a school is a
///   configuration inconsistency, not a fallthrough.
///
/// # Errors
///
/// `TenantContextRequired`, `TenantContextMissing`, or
/// `CrossTenantAccessDenied`, all 403.
pub(crate) fn resolve_school_scope(
    principal: &Principal,
    requested: Option<Uuid>,
    require_for_platform: bool,
) -> Result<Option<Uuid>, ApiError> {
    if principal.role.is_platform() {
        return match requested {
            Some(school_id) => Ok(Some(school_id)),
            None if require_for_platform => Err(ApiError::TenantContextRequired),
            None => Ok(None),
        };
    }

    let Some(own_school) = principal.school_id else {
        return Err(ApiError::TenantContextMissing);
    };

    match requested {
        Some(school_id) if school_id != own_school => Err(ApiError::CrossTenantAccessDenied),
        _ => Ok(Some(own_school)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::types::Role;

    fn principal(role: Role, school_id: Option<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "user@school.edu".to_string(),
            role,
            school_id,
        }
    }

    #[test]
    fn superadmin_may_pick_any_school() {
        let school = Uuid::new_v4();
        let caller = principal(Role::Superadmin, None);
        let resolved = resolve_school_scope(&caller, Some(school), false);
        assert_eq!(resolved.ok(), Some(Some(school)));
    }

    #[test]
    fn superadmin_without_school_gets_platform_view() {
        let caller = principal(Role::Superadmin, None);
        let resolved = resolve_school_scope(&caller, None, false);
        assert_eq!(resolved.ok(), Some(None));
    }

    #[test]
    fn superadmin_must_pick_when_required() {
        let caller = principal(Role::Superadmin, None);
        let resolved = resolve_school_scope(&caller, None, true);
        assert!(matches!(resolved, Err(ApiError::TenantContextRequired)));
    }

    #[test]
    fn bound_caller_defaults_to_own_school() {
        let school = Uuid::new_v4();
        let caller = principal(Role::Schooladmin, Some(school));
        let resolved = resolve_school_scope(&caller, None, false);
        assert_eq!(resolved.ok(), Some(Some(school)));
    }

    #[test]
    fn bound_caller_may_name_own_school() {
        let school = Uuid::new_v4();
        let caller = principal(Role::Teacher, Some(school));
        let resolved = resolve_school_scope(&caller, Some(school), false);
        assert_eq!(resolved.ok(), Some(Some(school)));
    }

    #[test]
    fn cross_tenant_request_is_denied() {
        let caller = principal(Role::Schooladmin, Some(Uuid::new_v4()));
        let resolved = resolve_school_scope(&caller, Some(Uuid::new_v4()), false);
        assert!(matches!(resolved, Err(ApiError::CrossTenantAccessDenied)));
    }

    #[test]
    fn bound_caller_without_school_is_a_config_error() {
        let caller = principal(Role::Teacher, None);
        let resolved = resolve_school_scope(&caller, None, false);
        assert!(matches!(resolved, Err(ApiError::TenantContextMissing)));

        // Even when a school is explicitly requested.
        let resolved = resolve_school_scope(&caller, Some(Uuid::new_v4()), false);
        assert!(matches!(resolved, Err(ApiError::TenantContextMissing)));
    }
}
