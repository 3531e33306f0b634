use super::actor::Role;
use crate::models::comment::Comment;

/// Drop internal comments for employee viewers; agent-class roles see the
/// full thread. Order and content pass through untouched, only membership
/// changes.
pub fn filter_comments(comments: Vec<Comment>, viewer: Role) -> Vec<Comment> {
    if viewer.is_agent_class() {
        return comments;
    }

    comments.into_iter().filter(|c| !c.is_internal).collect()
}
