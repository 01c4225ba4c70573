pub mod ledger_api;
pub mod nickname_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod support_api;
pub mod support_objects;
