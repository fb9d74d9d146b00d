/// Errors raised while turning raw text into an [`loom_types::InputItem`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassifierError {
	#[error("command line has no verb after '/'")]
	EmptyVerb,
}
