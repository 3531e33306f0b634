use super::actor::{Actor, Role, TicketContext};
use super::lifecycle::TicketStatus;

/// Actions a caller can attempt against a ticket or one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketAction {
    View,
    Modify,
    Assign,
    Comment,
    Attach,
    DeleteComment,
    DeleteAttachment,
}

impl TicketAction {
    pub const ALL: [TicketAction; 7] = [
        TicketAction::View,
        TicketAction::Modify,
        TicketAction::Assign,
        TicketAction::Comment,
        TicketAction::Attach,
        TicketAction::DeleteComment,
        TicketAction::DeleteAttachment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketAction::View => "view",
            TicketAction::Modify => "modify",
            TicketAction::Assign => "assign",
            TicketAction::Comment => "comment",
            TicketAction::Attach => "attach",
            TicketAction::DeleteComment => "delete_comment",
            TicketAction::DeleteAttachment => "delete_attachment",
        }
    }
}

/// Policy evaluator trait for pluggable authorization logic.
///
/// Implementations must be pure: the same (actor, action, context) inputs
/// always yield the same decision, with no hidden state, so every entry
/// point shares one table instead of re-deriving role branches per call site.
pub trait PolicyEvaluator: Send + Sync {
    fn can(&self, actor: &Actor, action: TicketAction, ctx: &TicketContext) -> bool;
}

/// Default evaluator implementing the fixed ticket policy table.
///
/// Evaluation order, most to least privileged, deny overrides:
/// 1. admin / supervisor -> view/modify/assign/comment/attach unconditionally
/// 2. agent -> assign unconditionally; view/modify/comment/attach iff
///    assignee or ticket unassigned (any agent may triage unclaimed tickets)
/// 3. employee -> view/comment/attach iff creator; modify iff creator and
///    status is open or pending_user; assign never
/// 4. ownership actions -> original author/uploader, or admin
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn can(&self, actor: &Actor, action: TicketAction, ctx: &TicketContext) -> bool {
        let allowed = match action {
            // Ownership actions: author/uploader or admin. Supervisors and
            // agents get no override for other people's comments and files.
            TicketAction::DeleteComment | TicketAction::DeleteAttachment => {
                actor.role == Role::Admin || ctx.is_resource_owner(actor)
            }
            TicketAction::Assign => actor.role.is_agent_class(),
            TicketAction::View | TicketAction::Comment | TicketAction::Attach => match actor.role {
                Role::Admin | Role::Supervisor => true,
                Role::Agent => ctx.is_assignee(actor) || ctx.is_unassigned(),
                Role::Employee => ctx.is_creator(actor),
            },
            TicketAction::Modify => match actor.role {
                Role::Admin | Role::Supervisor => true,
                Role::Agent => ctx.is_assignee(actor) || ctx.is_unassigned(),
                Role::Employee => {
                    ctx.is_creator(actor)
                        && matches!(ctx.status, TicketStatus::Open | TicketStatus::PendingUser)
                }
            },
        };

        if !allowed {
            tracing::debug!(
                actor_id = %actor.id,
                role = %actor.role,
                action = action.as_str(),
                "policy denied"
            );
        }

        allowed
    }
}

/// Internal-comment authoring is gated independently of the `comment`
/// permission: only agent-class roles may write comments hidden from the
/// ticket creator.
pub fn can_author_internal(role: Role) -> bool {
    role.is_agent_class()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(
        actor: &Actor,
        is_creator: bool,
        is_assignee: bool,
        is_unassigned: bool,
        is_owner: bool,
        status: TicketStatus,
    ) -> TicketContext {
        let assigned_to = if is_unassigned {
            None
        } else if is_assignee {
            Some(actor.id)
        } else {
            Some(Uuid::new_v4())
        };

        TicketContext {
            created_by: if is_creator { actor.id } else { Uuid::new_v4() },
            assigned_to,
            status,
            resource_owner: Some(if is_owner { actor.id } else { Uuid::new_v4() }),
        }
    }

    /// Independent statement of the policy table, used as the oracle for the
    /// generated truth-table test below.
    fn expected(
        role: Role,
        action: TicketAction,
        is_creator: bool,
        is_assignee: bool,
        is_unassigned: bool,
        is_owner: bool,
        status: TicketStatus,
    ) -> bool {
        use TicketAction::*;

        match action {
            DeleteComment | DeleteAttachment => role == Role::Admin || is_owner,
            Assign => matches!(role, Role::Agent | Role::Supervisor | Role::Admin),
            View | Comment | Attach => match role {
                Role::Admin | Role::Supervisor => true,
                Role::Agent => is_assignee || is_unassigned,
                Role::Employee => is_creator,
            },
            Modify => match role {
                Role::Admin | Role::Supervisor => true,
                Role::Agent => is_assignee || is_unassigned,
                Role::Employee => {
                    is_creator && matches!(status, TicketStatus::Open | TicketStatus::PendingUser)
                }
            },
        }
    }

    #[test]
    fn truth_table_all_roles_actions_relationships() {
        let evaluator = DefaultPolicyEvaluator::new();

        for role in Role::ALL {
            let actor = Actor::new(Uuid::new_v4(), role);
            for action in TicketAction::ALL {
                for is_creator in [false, true] {
                    // (is_assignee, is_unassigned); both true is unrepresentable
                    for (is_assignee, is_unassigned) in
                        [(false, false), (true, false), (false, true)]
                    {
                        for is_owner in [false, true] {
                            for status in TicketStatus::ALL {
                                let ctx = ctx(
                                    &actor,
                                    is_creator,
                                    is_assignee,
                                    is_unassigned,
                                    is_owner,
                                    status,
                                );
                                let want = expected(
                                    role,
                                    action,
                                    is_creator,
                                    is_assignee,
                                    is_unassigned,
                                    is_owner,
                                    status,
                                );
                                assert_eq!(
                                    evaluator.can(&actor, action, &ctx),
                                    want,
                                    "role={role:?} action={action:?} creator={is_creator} \
                                     assignee={is_assignee} unassigned={is_unassigned} \
                                     owner={is_owner} status={status:?}"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn evaluator_is_deterministic() {
        let evaluator = DefaultPolicyEvaluator::new();
        let actor = Actor::new(Uuid::new_v4(), Role::Agent);
        let ctx = ctx(&actor, false, true, false, false, TicketStatus::Assigned);

        let first = evaluator.can(&actor, TicketAction::Modify, &ctx);
        for _ in 0..10 {
            assert_eq!(evaluator.can(&actor, TicketAction::Modify, &ctx), first);
        }
    }

    #[test]
    fn any_agent_may_triage_unassigned_tickets() {
        let evaluator = DefaultPolicyEvaluator::new();
        let agent = Actor::new(Uuid::new_v4(), Role::Agent);
        let ctx = ctx(&agent, false, false, true, false, TicketStatus::Open);

        assert!(evaluator.can(&agent, TicketAction::View, &ctx));
        assert!(evaluator.can(&agent, TicketAction::Modify, &ctx));
        assert!(evaluator.can(&agent, TicketAction::Comment, &ctx));
        assert!(evaluator.can(&agent, TicketAction::Attach, &ctx));
    }

    #[test]
    fn agent_denied_on_someone_elses_ticket() {
        let evaluator = DefaultPolicyEvaluator::new();
        let agent = Actor::new(Uuid::new_v4(), Role::Agent);
        let ctx = ctx(&agent, false, false, false, false, TicketStatus::Assigned);

        assert!(!evaluator.can(&agent, TicketAction::View, &ctx));
        assert!(!evaluator.can(&agent, TicketAction::Modify, &ctx));
        // Assign stays open to any agent: reassignment is how tickets move
        // between queues.
        assert!(evaluator.can(&agent, TicketAction::Assign, &ctx));
    }

    #[test]
    fn employee_modify_window_closes_after_assignment() {
        let evaluator = DefaultPolicyEvaluator::new();
        let employee = Actor::new(Uuid::new_v4(), Role::Employee);

        let open = ctx(&employee, true, false, true, false, TicketStatus::Open);
        assert!(evaluator.can(&employee, TicketAction::Modify, &open));

        let pending = ctx(&employee, true, false, false, false, TicketStatus::PendingUser);
        assert!(evaluator.can(&employee, TicketAction::Modify, &pending));

        let in_progress = ctx(&employee, true, false, false, false, TicketStatus::InProgress);
        assert!(!evaluator.can(&employee, TicketAction::Modify, &in_progress));
        // View is relationship-gated only, not status-gated.
        assert!(evaluator.can(&employee, TicketAction::View, &in_progress));
    }

    #[test]
    fn supervisor_cannot_delete_others_comments() {
        let evaluator = DefaultPolicyEvaluator::new();
        let supervisor = Actor::new(Uuid::new_v4(), Role::Supervisor);
        let ctx = ctx(&supervisor, false, false, false, false, TicketStatus::InProgress);

        assert!(!evaluator.can(&supervisor, TicketAction::DeleteComment, &ctx));
        assert!(!evaluator.can(&supervisor, TicketAction::DeleteAttachment, &ctx));
    }

    #[test]
    fn internal_comment_gate() {
        assert!(!can_author_internal(Role::Employee));
        assert!(can_author_internal(Role::Agent));
        assert!(can_author_internal(Role::Supervisor));
        assert!(can_author_internal(Role::Admin));
    }
}
