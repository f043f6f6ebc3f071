pub mod conflicts;
pub mod connect;
pub mod delete;
pub mod disconnect;
pub mod edit;
pub mod events;
pub mod new;
pub mod resolve;
pub mod sources;
pub mod sync;
pub mod toggle;
