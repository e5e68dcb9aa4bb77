pub mod dispatcher;
pub mod poller;
pub mod push;
pub mod store;
