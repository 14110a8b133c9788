pub mod dashboard;
pub mod edit_buffer;
pub mod eligibility;
pub mod filter;
pub mod month;
pub mod progression;
pub mod snapshot;
pub mod store;
pub mod validation;
pub mod workflow;

#[cfg(test)]
pub mod memory_store;
