// Project module
// The editable project model, its shared store and JSON persistence

pub mod manager;
pub mod model;
pub mod serialization;
pub mod store;
pub mod types;

pub use manager::{ProjectError, ProjectManager, default_file_name, default_project_dir};
pub use model::{PatternGrid, ProjectModel, SongBlocks};
pub use serialization::{LoadedProject, export_project, import_project, to_json_bytes};
pub use store::ProjectStore;
pub use types::{InstrumentMeta, SAVE_FILE_VERSION, SaveFileV1};
