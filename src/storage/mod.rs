pub mod gateway;
pub mod csv_gateway;
pub mod image_store;

pub use gateway::{ImageRecord, MemoryGateway, PersistenceGateway, PredictionRecord, RecordId};
pub use csv_gateway::CsvGateway;
pub use image_store::{ImageStore, StoredImage};
