//! Event fan-out contracts
