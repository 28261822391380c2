// Services layer
// Services own the shared mutable state; HTTP handlers only translate requests

pub mod command;
pub mod subscribers;
pub mod supervisor;

pub use subscribers::{DeliveryReport, SendFailure, Subscriber, SubscriberId, SubscriberRegistry};
pub use supervisor::{Started, Stopped, WorkerSupervisor};
