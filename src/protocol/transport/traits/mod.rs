//! Abstraction traits used by the transport layer (CAN bus, controller
//! bring-up, timer, and the ISO-TP link object).
pub mod can_bus;
pub mod can_controller;
pub mod isotp_link;
pub mod tp_timer;
