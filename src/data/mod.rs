//! Data layer: alignment table types, persistence, and row selection.
//!
//! Architecture:
//! ```text
//!   aligned rows (assembler)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  drop unknown labels, balanced per-label sampling
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  writer   │  Dataset → .csv / .feather
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  .csv / .feather → Dataset (slot count from column count)
//!   └──────────┘
//!
//!   columns: plain numeric .csv / .feather tables for ColumnDataset
//! ```

pub mod columns;
pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
