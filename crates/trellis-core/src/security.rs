//! Security context attached to requests.

use std::fmt;

/// Security information about the caller of a request.
///
/// The transport may attach its own implementation before dispatch. When it
/// does not, the pipeline installs [`DefaultSecurityContext`].
pub trait SecurityContext: Send + Sync + fmt::Debug {
    /// Name of the authenticated principal, if any.
    fn principal(&self) -> Option<&str>;

    /// Returns `true` if the principal holds `role`.
    fn is_user_in_role(&self, role: &str) -> bool;

    /// Returns `true` if the request arrived over a secure channel.
    fn is_secure(&self) -> bool;

    /// Authentication scheme used, e.g. `"BASIC"`.
    fn authentication_scheme(&self) -> Option<&str>;
}

/// Security context for unauthenticated requests.
///
/// No principal, no scheme, not secure, and never in any role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultSecurityContext;

impl SecurityContext for DefaultSecurityContext {
    fn principal(&self) -> Option<&str> {
        None
    }

    fn is_user_in_role(&self, _role: &str) -> bool {
        false
    }

    fn is_secure(&self) -> bool {
        false
    }

    fn authentication_scheme(&self) -> Option<&str> {
        None
    }
}
