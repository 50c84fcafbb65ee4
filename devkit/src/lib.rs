/*!
# Hoststat DevKit - test doubles for broker-less development

- `MemoryBus`: in-process bus with failure injection and introspection
- `TestHarness`: expectations and polling helpers over a `MemoryBus`
*/

pub mod memory_bus;
pub mod test_utils;

pub use memory_bus::{MemoryBus, PublishedMessage};
pub use test_utils::{wait_until, TestHarness};
