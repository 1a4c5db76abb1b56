pub mod json_writer;

pub use json_writer::{DatasetFileInfo, JsonWriter, ProcessedDataset, ProcessedMetadata};
