pub mod assignment;
pub mod live;
pub mod submission;

pub use assignment::{AssignmentKind, AssignmentRecord, ClusterAssignment, Group, Theme};
pub use live::{
    ConnectionStatus, GroupCompletionStatus, GroupStats, LivePresentationPrompt,
    ParticipantConnection, ParticipantIdentity, PromptInputType, SessionStats,
};
pub use submission::{StudentSubmission, StudentVector};
