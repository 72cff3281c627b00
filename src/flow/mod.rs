pub mod countdown;
pub mod poller;
