//! Error kinds surfaced by the engine. Only the kinds that are ever handed
//! back to a caller get a variant here: a not-found result is modeled as
//! `Option::None`, and a name collision on `add_child` is handled by
//! auto-minting — neither ever reaches this type.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HearthError {
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),

	#[error("cannot remove the root entity")]
	RemoveRoot,

	#[error("resource archive io failure for {path}: {source}")]
	IoFailure {
		path: String,
		#[source]
		source: io::Error,
	},
}

pub type HearthResult<T> = Result<T, HearthError>;
