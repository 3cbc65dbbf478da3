//! Event envelopes, wire payloads and the publish/subscribe port.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;
pub mod payload;

pub use bus::{BusMessage, EventBus, Subscription};
pub use envelope::{EnvelopeError, EventEnvelope};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use payload::{event_types, CatalogProductPayload, OrderPayload, PriceUpdatedPayload};
