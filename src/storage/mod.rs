pub mod assignments;
pub mod attempts;
pub mod classes;
pub mod db;
pub mod documents;
pub mod notifications;
pub mod quizzes;
pub mod reviews;
pub mod users;

pub use assignments::{Assignment, AssignmentStore};
pub use attempts::{AttemptRecord, AttemptStore, StandaloneResponse};
pub use classes::{Class, ClassStore};
pub use db::Database;
pub use documents::{Document, DocumentStore, NewDocument};
pub use notifications::NotificationStore;
pub use quizzes::QuizStore;
pub use reviews::ReviewStore;
pub use users::UserStore;
