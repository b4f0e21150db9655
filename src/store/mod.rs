//! Session persistence for the select-organisation flow.

pub mod dynamodb;
