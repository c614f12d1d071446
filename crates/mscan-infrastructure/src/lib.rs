pub mod config_service;
pub mod dto;
pub mod paths;
pub mod report_archive;
pub mod storage;
pub mod toml_prompt_repository;
pub mod upload_storage;

pub use crate::config_service::ConfigService;
pub use crate::paths::ScanPaths;
pub use crate::report_archive::ReportArchive;
pub use crate::toml_prompt_repository::TomlPromptRepository;
pub use crate::upload_storage::FsDocumentStore;
