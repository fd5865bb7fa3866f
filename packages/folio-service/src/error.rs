use folio_domain::SourceKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Invalid configuration: {message}")]
	InvalidConfiguration { message: String },
	#[error("The {kind} backend is unavailable: {message}")]
	BackendUnavailable { kind: SourceKind, message: String },
	#[error("Both retrieval backends are unavailable (lexical: {lexical}; vector: {vector}).")]
	BackendsUnavailable { lexical: String, vector: String },
	#[error("Embedding unavailable: {message}")]
	EmbeddingUnavailable { message: String },
	#[error("Rephrase unavailable: {message}")]
	RephraseUnavailable { message: String },
}
impl Error {
	pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
		Self::InvalidInput { message: message.into() }
	}

	pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
		Self::InvalidConfiguration { message: message.into() }
	}

	pub(crate) fn backend(kind: SourceKind, message: impl Into<String>) -> Self {
		Self::BackendUnavailable { kind, message: message.into() }
	}
}

impl From<folio_storage::Error> for Error {
	fn from(err: folio_storage::Error) -> Self {
		Self::backend(SourceKind::Vector, err.to_string())
	}
}
