//! Flutter-facing bindings for the Pocketbook ledger core.

pub mod api;
