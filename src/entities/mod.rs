pub mod movie;
pub mod screening;
pub mod theater;
