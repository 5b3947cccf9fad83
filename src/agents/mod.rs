// Voice agent modules
//
// Personas, the operations the controlling language model invokes on them,
// and the sessions holding each conversation's record.

pub mod normalize;
pub mod observers;
pub mod prompts;
pub mod registry;
pub mod session;
pub mod variants;

// Re-export main types
pub use observers::{ChannelObserver, Observer, ObserverList};
pub use registry::{Action, Argument, Operation, OperationRegistry};
pub use session::{CaptureSession, SessionSnapshot};
pub use variants::AgentVariant;
