//! Deployment processing.
//!
//! - [`transformer`]: validation, versioning and registration of definitions
//! - [`reconciler`]: timer start event reconciliation
//! - [`create_processor`]: the `Deployment Create` command processor
//! - [`distribution`], [`distribute_processor`]: fan-out to other partitions
//! - [`message_start`]: message start event reactivation

pub mod create_processor;
pub mod distribute_processor;
pub mod distribution;
pub mod message_start;
pub mod reconciler;
pub mod transformer;

pub use create_processor::{
    DeploymentCreateProcessor, ProcessingError, COULD_NOT_CREATE_TIMER_MESSAGE,
};
pub use distribute_processor::{DeploymentDistributeProcessor, DistributeError};
pub use distribution::{
    ChannelDeploymentDistributor, DeploymentDistributor, DistributionRequest, DistributionWorker,
    NoopDistributor, PartitionTransport, TransportError,
};
pub use message_start::{
    ChannelMessageStartReactivator, MessageStartReactivator, MessageStartSubscriptionManager,
    ReactivationRequest,
};
pub use reconciler::{DeploymentReconciler, ReconcileError, ReconcileSummary, RetireStrategy};
pub use transformer::{
    DeploymentTransformer, DeploymentValidator, TransformContext, TransformOutcome,
};
