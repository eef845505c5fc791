use tokio::sync::broadcast;

/// Interrupt trigger shared between the signal listener and the coordinator.
pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;
