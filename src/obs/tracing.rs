// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::obs::FlowKind;

/// Span wrapping one acquisition.
#[derive(Clone, Debug)]
pub struct FlowSpan(Span);
impl FlowSpan {
	/// Opens a span tagged with `kind` and `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self(tracing::info_span!("oauth2_token_manager.flow", flow = kind.as_str(), stage))
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument as _;

		fut.instrument(self.0.clone())
	}
}
