/// Archive layer: naming, remote catalogue, local mirror, and file reading.
///
/// ```text
///   variable name ──► variables ──► ArchiveQuery ──► remote (Catalogue)
///                                                        │ file names
///                                                        ▼
///                          naming (name → ./mms/... path) ──► sync (FileSync)
///                                                        │ local files
///                                                        ▼
///                                                 reader (ArchiveReader)
/// ```

pub mod memory;
pub mod naming;
pub mod reader;
pub mod remote;
pub mod sync;
pub mod variables;
