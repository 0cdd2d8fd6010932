// Deployment state machine module
//
// The lifecycle guard is a pure decision table; the state machine applies it in front
// of the persistence boundary so no illegal status change is ever written.

pub mod deployment_state_machine;
pub mod errors;
pub mod events;
pub mod guards;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use deployment_state_machine::DeploymentStateMachine;
pub use errors::{PersistenceError, StateMachineError, StateMachineResult};
pub use events::DeploymentEvent;
pub use guards::{StateTransitionGuard, TransitionResult};
pub use persistence::{DeploymentStore, DeploymentTransition, InMemoryDeploymentStore};
pub use states::DeploymentStatus;
