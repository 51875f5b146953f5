pub mod aggregator;
pub mod engine;
pub mod parser;
pub mod report;
pub mod runner;
pub mod workflow;

pub use crate::domain::model::{DonateInfo, DonationBatch, DonationOutcome, DonationRecord};
pub use crate::domain::ports::{ConfigProvider, PaymentGateway, RecordSource};
pub use crate::utils::error::Result;
