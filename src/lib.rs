//! Machine-learning datasets from sparse labels and an on-demand archive.
//!
//! Building a table:
//! ```text
//!   LabelIngestion ──► label epochs
//!                          │
//!   Catalogue ─► FileSync ─► ArchiveReader ─► TemporalAligner (per variable)
//!                          │
//!                  DatasetAssembler ─► clean / sample / sort ─► .csv | .feather
//! ```
//!
//! Reading it back, [`IndexedAccessor`] turns each row into measurement
//! values, caching every archive file after its first read. Plain numeric
//! tables are served the same way by [`ColumnDataset`].

pub mod accessor;
pub mod align;
pub mod archive;
pub mod assemble;
pub mod config;
pub mod data;
pub mod epoch;
pub mod error;
pub mod labels;

pub use accessor::columns::{ColumnDataset, ColumnOptions, ColumnSample};
pub use accessor::presets::{DatasetPreset, PresetRegistry};
pub use accessor::transform::SampleTransform;
pub use accessor::{AccessorOptions, IndexedAccessor, Sample};
pub use align::{Alignment, ArchiveIndex, TemporalAligner, MAX_ALIGNMENT_GAP_NS};
pub use archive::remote::SdcClient;
pub use assemble::{BuildOptions, CreateOutcome, DatasetAssembler};
pub use config::Settings;
pub use data::columns::ColumnTable;
pub use data::model::{AlignedRow, Dataset, LabelRecord, VariableSlot};
pub use epoch::DateRange;
pub use error::{DatasetError, Result};
pub use labels::LabelSource;
