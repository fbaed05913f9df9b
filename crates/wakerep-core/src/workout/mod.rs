mod history;
mod progress;
mod session;

pub use history::{HistoryRepository, WorkoutRecord, WorkoutStats};
pub use progress::{completion_percentage, format_duration, motivational_message};
pub use session::{
    Feedback, FeedbackKind, SessionHandle, SessionListener, SessionState, WorkoutController,
    WorkoutSummary,
};
