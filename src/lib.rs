//! fluxrelay: relays monitoring check results to InfluxDB.
//!
//! Each inbound event carries free-text metric output. The transformation
//! pipeline rewrites it into line protocol (measurement, tags, fields,
//! timestamp) by matching bucket paths against user-defined template formats,
//! then buffers the result per destination handler until a size or age
//! threshold forces a flush.

pub mod config;
pub mod event;
pub mod relay;
pub mod transform;
