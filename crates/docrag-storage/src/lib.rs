//! # docrag-storage
//!
//! Where source documents come from. Every backend implements
//! [`FileStorage`](docrag_core::FileStorage): a flat listing of document names
//! and a download by name that fails with `NotFound` when the name is absent.
//!
//! | Type | Source |
//! |------|--------|
//! | [`DropboxStorage`] | A Dropbox folder, via the HTTP API |
//! | [`LocalDirStorage`] | Regular files directly inside a local directory |

pub mod dropbox;
pub mod local;

pub use dropbox::DropboxStorage;
pub use local::LocalDirStorage;
