//! Admin package management: editable drafts, the save state machine and the
//! HTTP handlers behind the admin screens.

pub mod draft;
pub mod form;
pub mod handlers;
