//! Data carried across the upload and export boundaries.
//!
//! Nothing here is persisted: parts live for one request, DTOs for one
//! response, artifacts until their bytes are written out.

pub mod export;
pub mod upload;
