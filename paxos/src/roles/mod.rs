//! The four Paxos role state machines and their wiring onto a [`crate::transport::Receiver`].

pub mod acceptor;
pub mod learner;
pub mod proposer;
pub mod updater;

pub use acceptor::AcceptorContext;
pub use learner::LearnerContext;
pub use proposer::ProposerContext;
pub use updater::UpdaterContext;

use std::sync::Arc;

use crate::message::MessageType;
use crate::transport::Receiver;

/// Registers the proposer's message-type callbacks on `receiver`. Mirrors the original
/// `RegisterProposer` free function: one place that knows which wire messages a role cares about.
pub fn register_proposer(receiver: &mut dyn Receiver, context: Arc<ProposerContext>) {
    let c = context.clone();
    receiver.register_callback(MessageType::RequestMessage, Box::new(move |m| c.handle_request(&m)));
    let c = context.clone();
    receiver.register_callback(MessageType::PromiseMessage, Box::new(move |m| c.handle_promise(&m)));
    let c = context.clone();
    receiver.register_callback(MessageType::NackTieMessage, Box::new(move |m| c.handle_nack_tie(&m)));
    let c = context.clone();
    receiver.register_callback(MessageType::NackMessage, Box::new(move |m| c.handle_nack(&m)));
    let c = context;
    receiver.register_callback(MessageType::ResumeMessage, Box::new(move |m| c.handle_resume(&m)));
}

pub fn register_acceptor(receiver: &mut dyn Receiver, context: Arc<AcceptorContext>) {
    let c = context.clone();
    receiver.register_callback(MessageType::PrepareMessage, Box::new(move |m| c.handle_prepare(&m)));
    let c = context;
    receiver.register_callback(MessageType::AcceptMessage, Box::new(move |m| c.handle_accept(&m)));
}

pub fn register_learner(receiver: &mut dyn Receiver, context: Arc<LearnerContext>) {
    let c = context.clone();
    receiver.register_callback(MessageType::AcceptedMessage, Box::new(move |m| c.handle_accepted(&m)));
    let c = context;
    receiver.register_callback(MessageType::UpdatedMessage, Box::new(move |m| c.handle_updated(&m)));
}

pub fn register_updater(receiver: &mut dyn Receiver, context: Arc<UpdaterContext>) {
    receiver.register_callback(MessageType::UpdateMessage, Box::new(move |m| context.handle_update(&m)));
}
