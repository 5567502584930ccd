pub mod audit;
pub mod dashboard;
pub mod notification;
pub mod quotation;
pub mod report;
pub mod rfq;
pub mod user;
