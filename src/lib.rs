// Exports de la bibliothèque mailsorter
// Permet aux tests et au binaire d'utiliser les modules

pub mod classifier;
pub mod config;
pub mod email;
pub mod email_processor;
pub mod gmail_client;
pub mod slack_notifier;
pub mod store;
