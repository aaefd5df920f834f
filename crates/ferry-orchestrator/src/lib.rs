//! Ferry Orchestrator Library
//!
//! The transfer state machine. One orchestrator drives each accepted
//! transfer through a fixed sequence of phases
//! (validate → authenticate → plan → transfer → verify → record → notify →
//! clean up), persisting every transition before the next phase begins.
//! Multiple transfers may run concurrently as independent state machines;
//! they share only the key-value store and the session broker.

pub mod collaborators;
pub mod intake;
pub mod orchestrator;
pub mod records;

pub use collaborators::{
    audit_sink_from_config, notifier_from_config, AuditSink, CollaboratorError, HttpAuditSink,
    HttpNotifier, LogAuditSink, LogNotifier, Notifier, OutcomeReport,
};
pub use intake::TransferRequest;
pub use orchestrator::{
    ConfigSourceFactory, ConfigTransportFactory, SourceFactory, TransferOrchestrator,
    TransportFactory,
};
pub use records::TransferRecordStore;
