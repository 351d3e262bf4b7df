pub mod contact;

pub use contact::{ConnectivityPolicy, ContactGraph, GraphConfig, GraphError};
