use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Dislike,
}

impl ReactionType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// The single thing a reaction points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Announcement(Uuid),
    Comment(Uuid),
}

impl ReactionTarget {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Announcement(id) | Self::Comment(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Announcement(_) => "announcement",
            Self::Comment(_) => "comment",
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Announcement(_) => "announcement_id",
            Self::Comment(_) => "comment_id",
        }
    }

    fn split(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Announcement(id) => (Some(*id), None),
            Self::Comment(id) => (None, Some(*id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub announcement_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: ReactionType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Reaction {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        target: ReactionTarget,
        kind: ReactionType,
        created_at: OffsetDateTime,
    ) -> Self {
        let (announcement_id, comment_id) = target.split();
        Self {
            id,
            user_id,
            announcement_id,
            comment_id,
            kind,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReactionSummary {
    pub likes: i64,
    pub dislikes: i64,
    pub own: Option<ReactionType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_points_at_exactly_one_target() {
        let id = Uuid::new_v4();
        let on_comment = Reaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ReactionTarget::Comment(id),
            ReactionType::Like,
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(on_comment.comment_id, Some(id));
        assert_eq!(on_comment.announcement_id, None);

        let on_announcement = Reaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ReactionTarget::Announcement(id),
            ReactionType::Dislike,
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(on_announcement.announcement_id, Some(id));
        assert_eq!(on_announcement.comment_id, None);
    }

    #[test]
    fn only_like_and_dislike_are_known() {
        assert_eq!(ReactionType::from_db("like"), Some(ReactionType::Like));
        assert_eq!(ReactionType::from_db("dislike"), Some(ReactionType::Dislike));
        assert_eq!(ReactionType::from_db("love"), None);
        assert_eq!(ReactionType::from_db("LIKE"), None);
    }
}
