pub mod fare_reader;
pub mod fare_writer;
