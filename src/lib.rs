pub mod drafts;
pub mod extensions;
pub mod modules;
pub mod observability;
pub mod pipeline;
pub mod presets;
pub mod registry;
pub mod schema;
pub mod script;
pub mod session;
pub mod store;
pub mod studio;
pub mod validation;
pub mod yaml;

pub use extensions::Registries;
pub use pipeline::{PipelineDocument, StageNode};
pub use registry::{ExtensionRegistry, Fragment, Handler};
pub use session::{EditorSession, SessionConfig};
pub use studio::{Action, Effect, EditorState, reduce};
