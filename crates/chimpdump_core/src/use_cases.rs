mod export;

pub use export::{ExportEvent, ExportUseCase};
