pub mod csv_file_source;
pub mod csv_table_store;
pub mod http_source;

pub use csv_file_source::CsvFileSource;
pub use csv_table_store::CsvTableStore;
pub use http_source::HttpCsvSource;
