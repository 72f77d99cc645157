pub mod announcement;
pub mod audit;
pub mod category;
pub mod comment;
pub mod message;
pub mod reaction;
pub mod user;
