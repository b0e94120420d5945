pub mod analysis;
pub mod config;
pub mod error;
pub mod parse;
pub mod reference;
pub mod scope;
pub mod session;
pub mod validate;
pub mod wasm;

pub use analysis::{analyze, analyze_json, analyze_request, render_outline, WorkflowReport};
pub use config::AnalyzerConfig;
pub use error::{AnalyzeError, StructuralError, StructuralErrorKind};
pub use reference::{Finding, FindingKind};
pub use scope::{Binding, BindingKind, Namespace};
pub use session::{AnalysisSession, StepUpdate};
