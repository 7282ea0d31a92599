//! Resolution of member-access chains to mapped navigations.

use std::sync::Arc;

use crate::{
    entity_catalog::{EntityModel, Navigation},
    query_planner::{
        errors::{RewriteError, RewriteResult},
        logical_expr::{Expr, ExprRef, ExprType, MemberAccess},
    },
};

/// `root` followed by the navigations walked from it, in access order.
///
/// Empty `navigations` means the accessed member is not a mapped navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationBinding {
    pub root: ExprRef,
    pub navigations: Vec<Arc<Navigation>>,
}

impl NavigationBinding {
    pub fn unbound(root: ExprRef) -> Self {
        NavigationBinding {
            root,
            navigations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.navigations.is_empty()
    }

    pub fn terminal(&self) -> Option<&Arc<Navigation>> {
        self.navigations.last()
    }

    /// The last navigation, if it is collection-valued.
    pub fn terminal_collection(&self) -> Option<&Arc<Navigation>> {
        self.terminal().filter(|nav| nav.is_collection)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait NavigationBinder {
    fn bind(&self, member: &MemberAccess, model: &EntityModel) -> RewriteResult<NavigationBinding>;
}

/// Binds chains against the entity model alone.
///
/// Walks from the innermost non-member expression outwards. Each member that
/// names a navigation on the current entity type extends the binding; any
/// other member (a scalar property, an unmapped member, a member of a
/// collection) restarts the chain with that member access as the new root.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelNavigationBinder;

impl NavigationBinder for ModelNavigationBinder {
    fn bind(&self, member: &MemberAccess, model: &EntityModel) -> RewriteResult<NavigationBinding> {
        // Innermost access last
        let mut chain: Vec<(&MemberAccess, Option<&ExprRef>)> = vec![(member, None)];
        let mut current = &member.target;
        while let Expr::MemberAccess(inner) = current.as_ref() {
            chain.push((inner, Some(current)));
            current = &inner.target;
        }

        let mut binding = NavigationBinding::unbound(current.clone());
        let mut owner_type = current.ty();

        for (access, node) in chain.into_iter().rev() {
            let navigation = owner_type
                .entity_name()
                .and_then(|owner| model.find_navigation(owner, &access.member));

            match navigation {
                Some(navigation) => {
                    check_link(access, navigation)?;
                    binding.navigations.push(navigation.clone());
                }
                None => {
                    // The outermost access has no node of its own; nothing follows it anyway
                    if let Some(node) = node {
                        binding = NavigationBinding::unbound(node.clone());
                    } else {
                        binding.navigations.clear();
                    }
                }
            }
            owner_type = access.ty.clone();
        }

        Ok(binding)
    }
}

/// `find_navigation` only searches the owner's own hierarchy, so a resolved
/// navigation is always reachable; what remains to check is that the member
/// access is typed the way the earlier stages typed it.
fn check_link(access: &MemberAccess, navigation: &Navigation) -> RewriteResult<()> {
    let target = ExprType::entity(&navigation.target_entity_type);
    let resolved = if navigation.is_collection {
        ExprType::sequence(target)
    } else {
        target
    };
    if access.ty != resolved {
        return Err(RewriteError::NavigationType {
            member: access.member.clone(),
            declared: access.ty.clone(),
            resolved,
        });
    }
    Ok(())
}
