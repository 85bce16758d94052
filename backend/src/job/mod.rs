//! Job lifecycle: creation, preparation, resolving and the state machine.
//!
//! ```text
//! ResolverJobFactory::create_job ──JobCreated──▶ JobQueue ──Prepare──▶ JobPreparationHandler
//!                                                   ▲                        │
//!                                                   └──PreparationCompleted──┘
//!                                                   │
//!                                                   └──Resolve──▶ TaskResolvingHandler
//! ```
//!
//! Every event reaches [`JobStateUpdater`] first; it is the only writer of
//! job status and failure.

pub mod dispatcher;
pub mod events;
pub mod factory;
pub mod preparation;
pub mod resolving;
pub mod state;

pub use dispatcher::{DispatchMessage, Dispatcher, DispatcherConfig, JobQueue};
pub use events::{EventBus, LifecycleEvent, LifecycleListener};
pub use factory::ResolverJobFactory;
pub use preparation::{JobPreparationHandler, JobPreparer, PreparationOutcome};
pub use resolving::{ResolvingOutcome, TaskResolver, TaskResolvingHandler};
pub use state::JobStateUpdater;
