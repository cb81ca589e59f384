//! Gleaner Document
//!
//! This crate defines the unit of data that flows between workflow steps.
//! A [`Document`] is fully populated by its producer and immutable afterwards,
//! so it is shared between consumers as a [`SharedDocument`] (`Arc<Document>`)
//! rather than copied.
//!
//! A [`Representation`] is a stateless view that encodes a document for one
//! output format. Publishing steps pick a representation by name with
//! [`representation_for`].

mod document;
mod error;
mod representation;

pub use document::{Document, DocumentId, SharedDocument};
pub use error::{DocumentError, SerializationError};
pub use representation::{
  Encoded, JsonRepresentation, KeyValueRepresentation, Representation, representation_for,
};
